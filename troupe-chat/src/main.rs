use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use troupe::{logging, log_error};
use troupe_chat::config::env_usize;
use troupe_chat::{ChatConfig, ChatService, SessionSink};

const DEFAULT_SESSIONS: usize = 32;
const CHAT_ROUNDS: usize = 3;

/// Stand-in for a network session: counts the lines it would have sent.
#[derive(Default)]
struct CountingSink {
    delivered: AtomicUsize,
}

impl SessionSink for CountingSink {
    fn deliver(&self, _sender: &str, _message: &str) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }
}

fn init_logging() {
    match std::env::var("TROUPE_LOG").as_deref() {
        Ok("dev") => logging::init_development(),
        Ok("json") => logging::init_production(),
        _ => logging::init_default(),
    }
}

fn main() -> Result<()> {
    init_logging();

    let config = ChatConfig::from_env()?;
    let session_total = env_usize("TROUPE_SESSIONS")?.unwrap_or(DEFAULT_SESSIONS);

    let (runtime, service) = ChatService::start(&config).context("failed to start chat service")?;
    let service = Arc::new(service);
    let room = service.create_room();
    info!(room = %room.room_id(), sessions = session_total, "chat server ready");

    let gauge = service.clone();
    let monitor = runtime
        .spawn_monitor_every(Duration::from_secs(1), move || gauge.session_count())
        .context("failed to start monitor")?;

    let sinks: Vec<_> = (0..session_total)
        .map(|index| {
            let sink = Arc::new(CountingSink::default());
            let session_id = format!("session-{index}");
            let weak: Weak<dyn SessionSink> = Arc::<CountingSink>::downgrade(&sink);
            service.open_session(&session_id, weak);
            (session_id, sink)
        })
        .collect();

    for (index, (session_id, _)) in sinks.iter().enumerate() {
        let joined = service
            .register(session_id, &format!("user-{index}"))
            .and_then(|()| service.enter_room(session_id));
        if let Err(err) = joined {
            log_error!(err, session = %session_id, operation = "join");
        }
    }

    for round in 0..CHAT_ROUNDS {
        for (session_id, _) in &sinks {
            let message = format!("round {round} from {session_id}");
            if let Err(err) = service.send_chat(session_id, &message) {
                log_error!(err, session = %session_id, operation = "send_chat");
            }
        }
        thread::sleep(Duration::from_secs(1));
    }

    let delivered: usize = sinks
        .iter()
        .map(|(_, sink)| sink.delivered.load(Ordering::Relaxed))
        .sum();
    let expected = CHAT_ROUNDS * session_total * session_total.saturating_sub(1);
    info!(delivered, expected, "chat simulation finished");

    for (session_id, _) in &sinks {
        if let Err(err) = service.close_session(session_id) {
            log_error!(err, session = %session_id, operation = "close_session");
        }
    }

    monitor.stop();
    runtime.shutdown();
    Ok(())
}
