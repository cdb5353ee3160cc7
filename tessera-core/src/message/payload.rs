//! Type-erased message payloads.
//!
//! A [`Message`] is an immutable tuple of reference-counted elements. Each
//! element carries its `TypeId`, so receivers match a payload against a
//! compile-time type list ([`Message::matches`]) and read elements by
//! position ([`Message::get`]) without downcasting surprises at a distance.

// Layer 1: Standard library imports
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
// (none)

/// A single element inside a [`Message`].
///
/// Implemented automatically for every `Any + Debug + Send + Sync` type;
/// user code never implements this trait by hand.
pub trait MessageElement: Any + Send + Sync {
    /// The element as `Any`, for positional downcasts.
    fn as_any(&self) -> &dyn Any;

    /// The `TypeId` of the concrete element type.
    fn element_type_id(&self) -> TypeId;

    /// Debug-format the element.
    fn fmt_element(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T: Any + fmt::Debug + Send + Sync> MessageElement for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn element_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn fmt_element(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Compile-time type list for payload matching.
///
/// Implemented for tuples of up to six element types. `(A,)` matches a
/// one-element payload of type `A`, `(A, B)` a two-element payload, and so
/// on.
pub trait Pattern {
    /// The type ids of the pattern, in order.
    fn type_ids() -> Vec<TypeId>;
}

macro_rules! impl_pattern {
    ($($name:ident),+) => {
        impl<$($name: Any),+> Pattern for ($($name,)+) {
            fn type_ids() -> Vec<TypeId> {
                vec![$(TypeId::of::<$name>()),+]
            }
        }
    };
}

impl_pattern!(T0);
impl_pattern!(T0, T1);
impl_pattern!(T0, T1, T2);
impl_pattern!(T0, T1, T2, T3);
impl_pattern!(T0, T1, T2, T3, T4);
impl_pattern!(T0, T1, T2, T3, T4, T5);

/// Immutable, reference-counted element tuple.
///
/// Cloning a message is cheap: each element is shared behind an `Arc`.
/// Concatenation builds a new tuple without copying element values, which
/// is what the splitter's fan-in and the adapter's prefix merging rely on.
///
/// # Example
/// ```rust
/// use tessera_core::message::Message;
///
/// let msg = Message::builder().append(1u32).append("hi").build();
/// assert_eq!(msg.len(), 2);
/// assert!(msg.matches::<(u32, &str)>());
/// assert_eq!(msg.get::<u32>(0), Some(&1));
/// assert_eq!(msg.get::<&str>(1), Some(&"hi"));
/// assert_eq!(msg.get::<u64>(0), None);
/// ```
#[derive(Clone, Default)]
pub struct Message {
    elements: Vec<Arc<dyn MessageElement>>,
}

impl Message {
    /// The empty message.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A one-element message.
    pub fn of<T: MessageElement>(value: T) -> Self {
        Self {
            elements: vec![Arc::new(value)],
        }
    }

    /// Start building a multi-element message.
    pub fn builder() -> MessageBuilder {
        MessageBuilder {
            elements: Vec::new(),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the message has no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Read the element at `index` as type `T`.
    ///
    /// Returns `None` when the index is out of range or the element has a
    /// different type.
    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        self.elements.get(index)?.as_any().downcast_ref::<T>()
    }

    /// The `TypeId` of the element at `index`.
    pub fn type_id_at(&self, index: usize) -> Option<TypeId> {
        self.elements.get(index).map(|e| e.element_type_id())
    }

    /// Whether the stored type-id list equals the pattern's, element for
    /// element.
    pub fn matches<P: Pattern>(&self) -> bool {
        let ids = P::type_ids();
        self.elements.len() == ids.len()
            && self
                .elements
                .iter()
                .zip(ids)
                .all(|(e, id)| e.element_type_id() == id)
    }

    /// Whether the element at `index` has type `T`.
    pub fn match_element<T: Any>(&self, index: usize) -> bool {
        self.type_id_at(index) == Some(TypeId::of::<T>())
    }

    /// A new message holding this message's elements followed by `other`'s.
    pub fn concat(&self, other: &Message) -> Message {
        let mut elements = Vec::with_capacity(self.elements.len() + other.elements.len());
        elements.extend(self.elements.iter().map(Arc::clone));
        elements.extend(other.elements.iter().map(Arc::clone));
        Message { elements }
    }

    /// Append all of `other`'s elements to this message in place.
    pub fn extend(&mut self, other: &Message) {
        self.elements.extend(other.elements.iter().map(Arc::clone));
    }

    pub(crate) fn element(&self, index: usize) -> Option<&Arc<dyn MessageElement>> {
        self.elements.get(index)
    }

    pub(crate) fn push_shared(&mut self, element: Arc<dyn MessageElement>) {
        self.elements.push(element);
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            element.fmt_element(f)?;
        }
        f.write_str(")")
    }
}

/// Builder accumulating elements for a [`Message`].
pub struct MessageBuilder {
    elements: Vec<Arc<dyn MessageElement>>,
}

impl MessageBuilder {
    /// Append one element.
    pub fn append<T: MessageElement>(mut self, value: T) -> Self {
        self.elements.push(Arc::new(value));
        self
    }

    /// Finish the message.
    pub fn build(self) -> Message {
        Message {
            elements: self.elements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_message() {
        let msg = Message::empty();
        assert!(msg.is_empty());
        assert_eq!(msg.len(), 0);
        assert!(!msg.matches::<(u32,)>());
    }

    #[test]
    fn test_single_element() {
        let msg = Message::of(17u32);
        assert_eq!(msg.len(), 1);
        assert!(msg.matches::<(u32,)>());
        assert_eq!(msg.get::<u32>(0), Some(&17));
    }

    #[test]
    fn test_positional_access() {
        let msg = Message::builder()
            .append(1u8)
            .append(2u16)
            .append(3u32)
            .build();
        assert_eq!(msg.get::<u8>(0), Some(&1));
        assert_eq!(msg.get::<u16>(1), Some(&2));
        assert_eq!(msg.get::<u32>(2), Some(&3));
        assert_eq!(msg.get::<u32>(0), None);
        assert_eq!(msg.get::<u8>(3), None);
    }

    #[test]
    fn test_matches_requires_exact_arity() {
        let msg = Message::builder().append(1u32).append(2u32).build();
        assert!(msg.matches::<(u32, u32)>());
        assert!(!msg.matches::<(u32,)>());
        assert!(!msg.matches::<(u32, u32, u32)>());
    }

    #[test]
    fn test_clone_shares_elements() {
        let msg = Message::of(String::from("payload"));
        let copy = msg.clone();
        assert_eq!(copy.get::<String>(0), msg.get::<String>(0));
    }

    #[test]
    fn test_concat_preserves_order() {
        let a = Message::builder().append(1u32).append(2u32).build();
        let b = Message::of(3u32);
        let joined = a.concat(&b);
        assert_eq!(joined.len(), 3);
        assert_eq!(joined.get::<u32>(2), Some(&3));
    }

    #[test]
    fn test_extend_in_place() {
        let mut acc = Message::empty();
        acc.extend(&Message::of(1u32));
        acc.extend(&Message::of(2u32));
        assert_eq!(acc.len(), 2);
        assert_eq!(acc.get::<u32>(1), Some(&2));
    }

    #[test]
    fn test_nested_message_element() {
        let inner = Message::of(9u64);
        let outer = Message::of(inner);
        let read = outer.get::<Message>(0);
        assert!(read.is_some());
        assert_eq!(read.and_then(|m| m.get::<u64>(0)), Some(&9));
    }

    #[test]
    fn test_debug_output() {
        let msg = Message::builder().append(1u32).append("x").build();
        assert_eq!(format!("{msg:?}"), "(1, \"x\")");
    }
}
