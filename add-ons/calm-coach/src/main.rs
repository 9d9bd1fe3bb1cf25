//! Calm Coach - hands-free voice coaching from the terminal.
//!
//! Listens on the default microphone (with the `device` feature), sends each finished
//! utterance through Deepgram, Claude and ElevenLabs, and plays the reply. Ctrl+C ends
//! the session.

use anyhow::Context;
use calm_voice::{
    build_capabilities, AudioSink, AudioSource, ConversationOrchestrator, ProviderConfig,
    ProviderHealth, SessionConfig, TracingStatus,
};
use std::io::BufRead;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[calm-coach] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SessionConfig::load().context("load session config")?;
    let providers = ProviderConfig::from_env().context("read provider settings")?;
    ProviderHealth::from_config(&providers).log();
    let capabilities = build_capabilities(&providers).context("configure providers")?;

    let (source, sink) = audio_devices(&config);
    let mut orchestrator =
        ConversationOrchestrator::new(config, capabilities, sink, Arc::new(TracingStatus))
            .context("create session")?;
    let handle = orchestrator.handle();

    tracing::info!(
        mode = ?providers.mode,
        auto_start = orchestrator.config().auto_start,
        "🧘 Calm coach ready"
    );

    if !orchestrator.config().auto_start {
        let start = handle.clone();
        println!("Press Enter to start talking.");
        start_on_enter(std::io::BufReader::new(std::io::stdin()), move || start.start());
    }

    let closer = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("CTRL-C received; ending session");
            closer.close();
        }
    });

    orchestrator
        .run(source.as_ref())
        .await
        .context("voice session failed")?;
    tracing::info!("👋 Calm coach stopped");
    Ok(())
}

/// Wait for one line on a plain thread. A pending stdin read on the runtime's blocking
/// pool would keep the process alive after Ctrl+C.
fn start_on_enter<R, F>(mut input: R, on_enter: F) -> std::thread::JoinHandle<()>
where
    R: BufRead + Send + 'static,
    F: FnOnce() + Send + 'static,
{
    std::thread::spawn(move || {
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) => tracing::debug!("stdin closed before Enter"),
            Ok(_) => on_enter(),
            Err(e) => tracing::warn!(error = %e, "stdin read failed"),
        }
    })
}

#[cfg(feature = "device")]
fn audio_devices(config: &SessionConfig) -> (Box<dyn AudioSource>, Arc<dyn AudioSink>) {
    (
        Box::new(calm_voice::CpalSource::new(
            config.sample_rate,
            config.frame_size.max(1024),
        )),
        Arc::new(calm_voice::RodioSink),
    )
}

#[cfg(not(feature = "device"))]
fn audio_devices(_config: &SessionConfig) -> (Box<dyn AudioSource>, Arc<dyn AudioSink>) {
    (Box::new(offline::NoMicrophone), Arc::new(calm_voice::NullSink))
}

#[cfg(not(feature = "device"))]
mod offline {
    use async_trait::async_trait;
    use calm_voice::{AudioSource, AudioStream, VoiceError, VoiceResult};

    /// Stand-in source for builds without audio device support.
    pub struct NoMicrophone;

    #[async_trait]
    impl AudioSource for NoMicrophone {
        async fn acquire(&self) -> VoiceResult<AudioStream> {
            Err(VoiceError::Acquisition(
                "built without the `device` feature; rebuild with --features device".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    /// Reader that blocks until its sender sends a byte or is dropped.
    struct Stalled(mpsc::Receiver<u8>);

    impl Read for Stalled {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.0.recv() {
                Ok(byte) => {
                    buf[0] = byte;
                    Ok(1)
                }
                Err(_) => Ok(0),
            }
        }
    }

    #[test]
    fn enter_starts_the_session() {
        let started = Arc::new(AtomicBool::new(false));
        let flag = started.clone();
        start_on_enter(Cursor::new(b"\n".to_vec()), move || flag.store(true, Ordering::SeqCst))
            .join()
            .unwrap();
        assert!(started.load(Ordering::SeqCst));
    }

    #[test]
    fn closed_stdin_does_not_start() {
        let started = Arc::new(AtomicBool::new(false));
        let flag = started.clone();
        start_on_enter(Cursor::new(Vec::new()), move || flag.store(true, Ordering::SeqCst))
            .join()
            .unwrap();
        assert!(!started.load(Ordering::SeqCst));
    }

    #[test]
    fn pending_read_does_not_hold_up_runtime_shutdown() {
        let (tx, rx) = mpsc::channel();
        let started = Arc::new(AtomicBool::new(false));
        let flag = started.clone();
        let reader = start_on_enter(BufReader::new(Stalled(rx)), move || {
            flag.store(true, Ordering::SeqCst)
        });

        let began = Instant::now();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async { tokio::time::sleep(Duration::from_millis(10)).await });
        drop(runtime);
        assert!(began.elapsed() < Duration::from_secs(2));
        assert!(!reader.is_finished());
        assert!(!started.load(Ordering::SeqCst));

        drop(tx);
        reader.join().unwrap();
        assert!(!started.load(Ordering::SeqCst));
    }
}
