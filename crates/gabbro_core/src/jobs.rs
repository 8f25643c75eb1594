use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

pub struct JobSystem {
    pool: ThreadPool,
}

impl JobSystem {
    pub fn new(num_threads: Option<usize>) -> Result<Self, ThreadPoolBuildError> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|index| format!("mesh-job-{index}"));
        if let Some(count) = num_threads {
            builder = builder.num_threads(count);
        }

        let pool = builder.build()?;
        Ok(Self { pool })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(job);
    }

    pub fn scope<'scope, OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce(&rayon::Scope<'scope>) -> R + Send,
        R: Send,
    {
        self.pool.scope(op)
    }
}

impl Default for JobSystem {
    fn default() -> Self {
        let available = std::thread::available_parallelism()
            .map(|parallelism| parallelism.get())
            .unwrap_or(4);
        let worker_threads = available.saturating_sub(1).max(2);
        Self::new(Some(worker_threads)).expect("failed to create default mesh job pool")
    }
}
