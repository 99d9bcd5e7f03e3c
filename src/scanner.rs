//! Распознавание кадров в фоне: не больше одного декодирования за раз,
//! кадры, пришедшие во время работы, выбрасываются, а не ставятся в очередь.

use image::DynamicImage;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

pub struct FrameScanner<D> {
    decoder: Arc<D>,
    busy: Arc<AtomicBool>,
    tx: Sender<Vec<String>>,
    rx: Receiver<Vec<String>>,
    dropped: u64,
}

impl<D> FrameScanner<D>
where
    D: Fn(&DynamicImage) -> Vec<String> + Send + Sync + 'static,
{
    pub fn new(decoder: D) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            decoder: Arc::new(decoder),
            busy: Arc::new(AtomicBool::new(false)),
            tx,
            rx,
            dropped: 0,
        }
    }

    /// `false`: кадр выброшен, потому что предыдущий ещё декодируется.
    pub fn offer(&mut self, frame: DynamicImage) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.dropped += 1;
            log::trace!("decode in flight, frame dropped ({} so far)", self.dropped);
            return false;
        }

        let decoder = Arc::clone(&self.decoder);
        let busy = Arc::clone(&self.busy);
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let _busy = BusyGuard(busy);
            let found = decoder(&frame);
            if !found.is_empty() {
                let _ = tx.send(found);
            }
        });
        true
    }

    pub fn try_next(&self) -> Option<Vec<String>> {
        self.rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Vec<String>> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Снимает флаг занятости и при панике декодера.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            log::warn!("QR decoder panicked, frame skipped");
        }
        self.0.store(false, Ordering::Release);
    }
}

/// Пропускает повторы одного и того же набора кодов подряд.
#[derive(Debug, Default)]
pub struct ChangeFilter {
    last: Option<Vec<String>>,
}

impl ChangeFilter {
    pub fn is_new(&mut self, payloads: &[String]) -> bool {
        if self.last.as_deref() == Some(payloads) {
            return false;
        }
        self.last = Some(payloads.to_vec());
        true
    }
}
