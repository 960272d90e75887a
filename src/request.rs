use std::{
    sync::{
        atomic::{AtomicBool, Ordering::SeqCst},
        Arc,
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{unbounded, Receiver, Sender};
use crossbeam_deque::{Steal, Worker};

const IDLE_WAIT: Duration = Duration::from_millis(50);

/// A fixed pool of threads that take jobs from a FIFO queue and post results to a channel.
pub struct Request<T, J> {
    tx: Sender<T>,
    rx: Receiver<T>,
    worker: Worker<J>,
    num_threads: u32,
    stopped: Arc<AtomicBool>,
}

impl<T, J> Request<T, J>
where
    T: Send + 'static,
    J: Send + 'static,
{
    pub fn new(num_threads: u32) -> Self {
        let (tx, rx) = unbounded();
        Self {
            rx,
            tx,
            worker: Worker::new_fifo(),
            num_threads: num_threads.max(1),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn run<F>(&self, worker: F)
    where
        F: Fn(J) -> T + Send + Sync + 'static,
    {
        let worker = Arc::new(worker);

        self.stopped.store(false, SeqCst);

        // Spawn worker threads to read from queue
        (0..self.num_threads).for_each(|_| {
            let s = self.worker.stealer();
            let result_transmitter = self.tx.clone();
            let worker = worker.clone();

            let stopped = self.stopped.clone();

            thread::spawn(move || loop {
                if stopped.load(SeqCst) {
                    break;
                }

                match s.steal() {
                    Steal::Success(job) => {
                        if result_transmitter.send(worker(job)).is_err() {
                            break;
                        }
                    }
                    Steal::Retry => (),
                    Steal::Empty => thread::sleep(IDLE_WAIT),
                }
            });
        });
    }

    pub fn stop(&self) {
        self.stopped.store(true, SeqCst);
    }

    /// Blocks until a worker posts a result.
    pub fn wait_next(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    pub fn give_job(&self, job: J) {
        self.worker.push(job);
    }
}

impl<T, J> Drop for Request<T, J> {
    fn drop(&mut self) {
        self.stopped.store(true, SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_jobs_are_processed() {
        let request: Request<u32, u32> = Request::new(3);
        request.run(|job| job * 2);

        for job in 1..=10 {
            request.give_job(job);
        }

        let mut results: Vec<u32> = (0..10).filter_map(|_| request.wait_next()).collect();
        results.sort_unstable();

        assert_eq!(results, (1..=10).map(|x| x * 2).collect::<Vec<u32>>());
        request.stop();
    }

    #[test]
    fn test_results_follow_queue_order_with_one_thread() {
        let request: Request<u32, u32> = Request::new(1);
        request.run(|job| job + 1);

        for job in 0..5 {
            request.give_job(job);
        }

        let results: Vec<u32> = (0..5).filter_map(|_| request.wait_next()).collect();
        assert_eq!(results, vec![1, 2, 3, 4, 5]);
        request.stop();
    }

    #[test]
    fn test_zero_threads_still_runs_one_worker() {
        let request: Request<String, String> = Request::new(0);
        request.run(|job| job.to_uppercase());
        request.give_job("egll".to_string());

        assert_eq!(request.wait_next().as_deref(), Some("EGLL"));
        request.stop();
    }
}
