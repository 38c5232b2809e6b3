// src/channel/persona.rs
//! Handshake personas
//!
//! Each persona mimics the initialization broadcast of a common developer or
//! monitoring tool: a source name, a payload shape, and the window in which
//! that tool usually announces itself.

use once_cell::sync::Lazy;
use rand::Rng;
use serde_json::{json, Value};
use std::ops::RangeInclusive;
use std::time::Duration;

/// One disguise for the handoff broadcast
#[derive(Debug, Clone)]
pub struct HandshakePersona {
    pub disguise_name: &'static str,
    pub payload_shape: Value,
    /// Announcement delay window (milliseconds)
    pub delay_window: RangeInclusive<u64>,
}

static POOL: Lazy<Vec<HandshakePersona>> = Lazy::new(|| {
    vec![
        HandshakePersona {
            disguise_name: "ReactDevTools_connect_v4",
            payload_shape: json!({ "type": "connect", "version": "4.28.0" }),
            delay_window: 50..=150,
        },
        HandshakePersona {
            disguise_name: "vue-devtools-hook",
            payload_shape: json!({ "method": "init", "version": "6.5.0" }),
            delay_window: 100..=300,
        },
        HandshakePersona {
            disguise_name: "redux-devtools-extension",
            payload_shape: json!({ "action": "START", "id": "autodetect" }),
            delay_window: 200..=500,
        },
        HandshakePersona {
            disguise_name: "sentry-init",
            payload_shape: json!({ "event": "ping", "sdk": { "name": "sentry.javascript.browser" } }),
            delay_window: 500..=1500,
        },
        HandshakePersona {
            disguise_name: "apollo-client-init",
            payload_shape: json!({ "cmd": "discover", "version": "3.7.1" }),
            delay_window: 300..=800,
        },
    ]
});

/// All personas
pub fn pool() -> &'static [HandshakePersona] {
    &POOL
}

/// Pick a persona at random
pub fn choose<R: Rng + ?Sized>(rng: &mut R) -> &'static HandshakePersona {
    &POOL[rng.gen_range(0..POOL.len())]
}

/// Find the persona whose disguise matches a broadcast, if any
pub fn recognize(source: &str, payload: &Value) -> Option<&'static HandshakePersona> {
    POOL.iter()
        .find(|persona| persona.disguise_name == source && persona.payload_shape == *payload)
}

impl HandshakePersona {
    /// Draw an announcement delay from this persona's window
    pub fn sample_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_millis(rng.gen_range(self.delay_window.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_pool_names_unique() {
        let mut names: Vec<_> = pool().iter().map(|p| p.disguise_name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), pool().len());
    }

    #[test]
    fn test_every_persona_recognized() {
        for persona in pool() {
            let found = recognize(persona.disguise_name, &persona.payload_shape).unwrap();
            assert_eq!(found.disguise_name, persona.disguise_name);
        }
    }

    #[test]
    fn test_foreign_broadcast_not_recognized() {
        assert!(recognize("ReactDevTools_connect_v4", &json!({ "type": "render" })).is_none());
        assert!(recognize("analytics", &json!({ "type": "connect", "version": "4.28.0" })).is_none());
    }

    #[test]
    fn test_delay_within_window() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let persona = choose(&mut rng);
            let delay = persona.sample_delay(&mut rng).as_millis() as u64;
            assert!(persona.delay_window.contains(&delay));
        }
    }
}
