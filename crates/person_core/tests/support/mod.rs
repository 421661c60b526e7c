#![allow(dead_code)]

use async_trait::async_trait;
use person_core::{Attribute, EnrichedValue, LookupError, LookupFailure, LookupResult, LookupSource};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// What a scripted lookup does once its delay has elapsed.
#[derive(Debug, Clone)]
pub enum Script {
    Value(Option<EnrichedValue>),
    Fail(&'static str),
    Hang,
    Panic,
}

/// In-process lookup source with per-attribute delay and behaviour.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    scripts: HashMap<Attribute, (Duration, Script)>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    /// Every attribute answers immediately with no value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Age 34, gender female, nationality RU; nationality answers first.
    pub fn kiska() -> Self {
        Self::new()
            .with(Attribute::Age, 30, Script::Value(Some(EnrichedValue::Age(34))))
            .with(
                Attribute::Gender,
                20,
                Script::Value(Some(EnrichedValue::Gender("female".to_string()))),
            )
            .with(
                Attribute::Nationality,
                5,
                Script::Value(Some(EnrichedValue::Nationality("RU".to_string()))),
            )
    }

    pub fn with(mut self, attribute: Attribute, delay_ms: u64, script: Script) -> Self {
        self.scripts
            .insert(attribute, (Duration::from_millis(delay_ms), script));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LookupSource for ScriptedSource {
    async fn fetch(
        &self,
        attribute: Attribute,
        _name: &str,
        _deadline: Instant,
    ) -> LookupResult<Option<EnrichedValue>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (delay, script) = self
            .scripts
            .get(&attribute)
            .cloned()
            .unwrap_or((Duration::ZERO, Script::Value(None)));

        tokio::time::sleep(delay).await;
        match script {
            Script::Value(value) => Ok(value),
            Script::Fail(message) => Err(LookupError::new(
                attribute,
                LookupFailure::Unavailable(message.to_string()),
            )),
            Script::Hang => Ok(std::future::pending().await),
            Script::Panic => panic!("scripted {attribute} lookup panic"),
        }
    }
}

/// Parent deadline far enough away to never be the binding bound.
pub fn distant_deadline() -> Instant {
    Instant::now() + Duration::from_secs(3600)
}
