use futures::future::{FutureExt, LocalBoxFuture};
use futures::task::{waker, ArcWake};
use futures_channel::oneshot;
use intmap::IntMap;
use queues::{IsQueue, Queue};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::{HarnessError, HarnessResult};

// Tasks never leave the thread that spawned them, the simulation is single threaded.
thread_local! {
    static READY_QUEUE: RefCell<Queue<u64>> = RefCell::new(Queue::new());
    static TASKS: RefCell<IntMap<TaskSlot>> = RefCell::new(IntMap::new());
    static NEXT_ID: Cell<u64> = Cell::new(0);
}

struct TaskSlot {
    name: String,
    // None while the task is being polled
    future: Option<LocalBoxFuture<'static, ()>>,
}

pub fn schedule_task(id: u64) {
    READY_QUEUE.with(|q| {
        let _ = q.borrow_mut().add(id);
    });
}

fn next_task() -> Option<u64> {
    READY_QUEUE.with(|q| q.borrow_mut().remove().ok())
}

/// Polls ready tasks until none is left.
#[inline]
pub fn run_once() {
    while let Some(id) = next_task() {
        process_task(id);
    }
}

#[inline]
fn process_task(id: u64) {
    let fut = TASKS.with(|t| t.borrow_mut().get_mut(id).and_then(|slot| slot.future.take()));
    let mut fut = match fut {
        Some(fut) => fut,
        // completed or cancelled, the stale wake-up is dropped
        None => return,
    };

    let waker = waker(Arc::new(TaskWaker { id }));
    let context = &mut Context::from_waker(&waker);
    match fut.as_mut().poll(context) {
        Poll::Pending => {
            let orphan = TASKS.with(|t| match t.borrow_mut().get_mut(id) {
                Some(slot) => {
                    slot.future = Some(fut);
                    None
                }
                None => Some(fut),
            });
            // task was cancelled while running
            drop(orphan);
        }
        Poll::Ready(()) => {
            let slot = TASKS.with(|t| t.borrow_mut().remove(id));
            drop(slot);
        }
    }
}

pub(crate) fn clear_ready_queue() {
    READY_QUEUE.with(|q| *q.borrow_mut() = Queue::new());
}

/// Drops every task of this thread.
pub(crate) fn clear_tasks() {
    let tasks: Vec<TaskSlot> = TASKS.with(|t| t.borrow_mut().drain().map(|(_, slot)| slot).collect());
    // dropping futures may wake other tasks, so this happens outside the borrow
    drop(tasks);
    clear_ready_queue();
}

pub fn task_count() -> usize {
    TASKS.with(|t| t.borrow().len())
}

struct TaskWaker {
    id: u64,
}

impl ArcWake for TaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        schedule_task(arc_self.id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    id: u64,
}

impl Task {
    pub fn fork<T: 'static>(future: impl Future<Output = T> + 'static) -> JoinHandle<T> {
        Task::spawn_from_future(future, "forked")
    }

    pub fn spawn_from_future<T: 'static>(
        future: impl Future<Output = T> + 'static,
        name: &str,
    ) -> JoinHandle<T> {
        let (tx, rx) = oneshot::channel::<T>();
        let id = NEXT_ID.with(|n| {
            let id = n.get();
            n.set(id + 1);
            id
        });
        let fut = async move {
            let _ = tx.send(future.await);
        }
        .boxed_local();
        TASKS.with(|t| {
            t.borrow_mut().insert(
                id,
                TaskSlot {
                    name: name.to_string(),
                    future: Some(fut),
                },
            )
        });
        schedule_task(id);
        JoinHandle {
            task: Task { id },
            name: name.to_string(),
            join_rx: rx,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> Option<String> {
        TASKS.with(|t| t.borrow().get(self.id).map(|slot| slot.name.clone()))
    }

    pub fn is_alive(&self) -> bool {
        TASKS.with(|t| t.borrow().contains_key(self.id))
    }

    /// The task is dropped without being polled again.
    pub fn cancel(&self) {
        let slot = TASKS.with(|t| t.borrow_mut().remove(self.id));
        drop(slot);
    }
}

pub struct JoinHandle<T> {
    task: Task,
    name: String,
    join_rx: oneshot::Receiver<T>,
}

impl<T> JoinHandle<T> {
    pub fn task(&self) -> Task {
        self.task
    }

    pub fn cancel(self) {
        self.task.cancel();
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = HarnessResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.join_rx.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(Ok(result)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(HarnessError::Cancelled {
                task: self.name.clone(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn forked_tasks_run_in_spawn_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            Task::fork(async move { order.borrow_mut().push(i) });
        }
        run_once();
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        assert_eq!(task_count(), 0);
    }

    #[test]
    fn join_handle_delivers_the_result() {
        let out = Rc::new(Cell::new(0));
        let out2 = out.clone();
        let child = Task::fork(async { 21 * 2 });
        Task::fork(async move {
            out2.set(child.await.unwrap());
        });
        run_once();
        assert_eq!(out.get(), 42);
    }

    #[test]
    fn cancelled_task_reports_cancellation_to_its_joiner() {
        let (_tx, rx) = oneshot::channel::<()>();
        let child = Task::spawn_from_future(async move { rx.await.ok() }, "blocked");
        let task = child.task();
        let seen = Rc::new(RefCell::new(None));
        let seen2 = seen.clone();
        Task::fork(async move {
            *seen2.borrow_mut() = Some(child.await);
        });
        run_once();
        assert!(task.is_alive());
        assert_eq!(task.name().as_deref(), Some("blocked"));
        task.cancel();
        run_once();
        assert!(matches!(
            seen.borrow().as_ref(),
            Some(Err(HarnessError::Cancelled { .. }))
        ));
        clear_tasks();
    }
}
