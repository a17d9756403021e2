use std::time::Instant;

/// RAII-таймер этапа: пишет в лог время работы при выходе из области видимости.
pub(crate) struct StageTimer {
    name: &'static str,
    start: Instant,
}

impl StageTimer {
    pub(crate) fn start(name: &'static str) -> Self {
        log::debug!("{name}...");
        Self {
            name,
            start: Instant::now(),
        }
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        log::info!("{}: {:.3?}", self.name, self.start.elapsed());
    }
}
