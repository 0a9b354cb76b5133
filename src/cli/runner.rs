use crate::core::session::{Observation, ObservationSink, Session, SessionOptions};
use crate::domain::config::{DmmConfig, Settings};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

/// Outcome of one session in a polling run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run: u32,
    pub address: String,
    pub readings: u64,
    pub flushed_bytes: usize,
    pub stop_reason: String,
    pub last_reading: Option<String>,
    /// Set when the session could not be established
    pub error: Option<String>,
}

/// Sessions to open one after another against one instrument
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub address: String,
    pub settings: Settings,
    pub options: SessionOptions,
    pub runs: u32,
    pub run_duration: Duration,
    pub pause: Duration,
}

impl RunPlan {
    pub fn from_config(config: &DmmConfig) -> Self {
        Self {
            address: config.instrument.address.clone(),
            settings: config.settings,
            options: SessionOptions::from_config(&config.timing, &config.settings),
            runs: config.runs.runs,
            run_duration: config.runs.run_duration(),
            pause: config.runs.pause(),
        }
    }
}

/// Forwards to another sink and remembers the latest reading
struct LastReadingSink {
    inner: Arc<dyn ObservationSink>,
    last: Mutex<Option<String>>,
}

impl LastReadingSink {
    fn take_last(&self) -> Option<String> {
        self.last.lock().ok().and_then(|mut last| last.take())
    }
}

impl ObservationSink for LastReadingSink {
    fn observe(&self, observation: Observation) {
        if let Observation::Reading(reading) = &observation {
            if let Ok(mut last) = self.last.lock() {
                *last = Some(reading.line.clone());
            }
        }
        self.inner.observe(observation);
    }
}

/// Open, poll and close a session `plan.runs` times.
///
/// A session that fails to start is recorded and the next run proceeds.
pub async fn run_sessions(plan: &RunPlan, sink: Arc<dyn ObservationSink>) -> Vec<RunSummary> {
    let recorder = Arc::new(LastReadingSink {
        inner: sink,
        last: Mutex::new(None),
    });
    let mut summaries = Vec::with_capacity(plan.runs as usize);

    for run in 1..=plan.runs {
        info!("Run #{}", run);
        summaries.push(run_once(plan, run, &recorder).await);

        if run < plan.runs && !plan.pause.is_zero() {
            tokio::time::sleep(plan.pause).await;
        }
    }

    summaries
}

async fn run_once(plan: &RunPlan, run: u32, recorder: &Arc<LastReadingSink>) -> RunSummary {
    let mut summary = RunSummary {
        run,
        address: plan.address.clone(),
        readings: 0,
        flushed_bytes: 0,
        stop_reason: "not started".to_string(),
        last_reading: None,
        error: None,
    };

    let sink: Arc<dyn ObservationSink> = recorder.clone();
    let mut session = match Session::connect(&plan.address, plan.settings, plan.options, sink).await {
        Ok(session) => session,
        Err(e) => {
            warn!("Run #{} could not start: {}", run, e);
            summary.error = Some(e.to_string());
            return summary;
        }
    };
    summary.flushed_bytes = session.discarded_bytes();

    // End early if the loop dies before the run is over
    tokio::select! {
        _ = tokio::time::sleep(plan.run_duration) => {}
        _ = session.stopped() => {}
    }

    match session.close().await {
        Ok(status) => {
            summary.readings = status.readings();
            summary.stop_reason = status
                .stop_reason()
                .map(ToString::to_string)
                .unwrap_or_else(|| status.to_string());
        }
        Err(e) => summary.error = Some(e.to_string()),
    }
    summary.last_reading = recorder.take_last();
    summary
}
