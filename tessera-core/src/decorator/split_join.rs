//! Short-lived collector actors for fan-out/fan-in.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use tracing::trace;

// Layer 3: Internal module imports
use crate::actor::event::{Behavior, SpawnOptions};
use crate::actor::exit_reason::ExitReason;
use crate::actor::handle::ActorRef;
use crate::message::envelope::MailboxElement;
use crate::message::payload::Message;
use crate::message::system::ErrorMsg;
use crate::scheduler::Scheduler;
use crate::system::actor_system::ActorSystem;
use crate::util::ids::MessageId;

/// Per-worker message assignments for one fan-out.
pub type WorkSet = Vec<(ActorRef, Message)>;

/// Spawn a hidden collector actor for one fan-out/fan-in round.
///
/// The first message the collector receives is the original request: it
/// applies `split` to the work set, sends each worker its share, and
/// records the response promise. Each following message is a worker
/// response folded into the accumulator with `join`; when all responses
/// arrived, `finish` converts the accumulator into the aggregated result,
/// which is delivered to the original sender in arrival order. A worker
/// error is forwarded to the requester and aborts the round.
pub(crate) fn spawn_collector<T, S, J, F>(
    system: &ActorSystem,
    workset: WorkSet,
    init: T,
    split: S,
    join: J,
    finish: F,
) -> ActorRef
where
    T: Send + 'static,
    S: FnOnce(&mut WorkSet, &Message) + Send + 'static,
    J: FnMut(&mut T, &Message) + Send + 'static,
    F: FnOnce(T) -> Message + Send + 'static,
{
    system.spawn_with(
        SpawnOptions {
            hidden: true,
            actor_name: Some("split_join_collector"),
            ..SpawnOptions::default()
        },
        collector_behavior(workset, init, split, join, finish),
    )
}

struct Reply {
    sender: Option<ActorRef>,
    mid: MessageId,
}

impl Reply {
    fn deliver(
        &self,
        from: &ActorRef,
        payload: Message,
        scheduler: Option<&dyn Scheduler>,
    ) {
        if self.mid.is_request() {
            if let Some(sender) = &self.sender {
                sender.enqueue(
                    MailboxElement::make(Some(from.clone()), self.mid.response_id(), payload),
                    scheduler,
                );
            }
        }
    }
}

fn collector_behavior<T, S, J, F>(
    workset: WorkSet,
    init: T,
    split: S,
    join: J,
    finish: F,
) -> Behavior
where
    T: Send + 'static,
    S: FnOnce(&mut WorkSet, &Message) + Send + 'static,
    J: FnMut(&mut T, &Message) + Send + 'static,
    F: FnOnce(T) -> Message + Send + 'static,
{
    let mut workset = Some(workset);
    let mut split = Some(split);
    let mut finish = Some(finish);
    let mut join = join;
    let mut value = Some(init);
    let mut awaited = 0usize;
    let mut reply: Option<Reply> = None;
    Box::new(move |ctx, element| {
        // a bounced worker request aborts the whole round
        if let Some(error) = element.payload.get::<ErrorMsg>(0) {
            if let Some(reply) = reply.take() {
                reply.deliver(
                    ctx.self_ref(),
                    Message::of(ErrorMsg {
                        reason: error.reason.clone(),
                    }),
                    ctx.scheduler(),
                );
            }
            ctx.quit(ExitReason::Normal);
            return None;
        }
        match workset.take() {
            Some(mut ws) => {
                // first message: the original request
                reply = Some(Reply {
                    sender: element.sender.clone(),
                    mid: element.mid,
                });
                if let Some(split) = split.take() {
                    split(&mut ws, &element.payload);
                }
                awaited = ws.len();
                if awaited == 0 {
                    if let (Some(reply), Some(value), Some(finish)) =
                        (reply.take(), value.take(), finish.take())
                    {
                        reply.deliver(ctx.self_ref(), finish(value), ctx.scheduler());
                    }
                    ctx.quit(ExitReason::Normal);
                    return None;
                }
                for (worker, msg) in ws {
                    let mid = ctx.new_request_id();
                    worker.enqueue(
                        MailboxElement::make(Some(ctx.self_ref().clone()), mid, msg),
                        ctx.scheduler(),
                    );
                }
            }
            None => {
                if awaited == 0 {
                    trace!("collector ignores stray response");
                    return None;
                }
                if let Some(value) = value.as_mut() {
                    join(value, &element.payload);
                }
                awaited -= 1;
                if awaited == 0 {
                    if let (Some(reply), Some(value), Some(finish)) =
                        (reply.take(), value.take(), finish.take())
                    {
                        reply.deliver(ctx.self_ref(), finish(value), ctx.scheduler());
                    }
                    ctx.quit(ExitReason::Normal);
                }
            }
        }
        None
    })
}
