//! # Profile Service Example
//!
//! A service that owns its cache instance and a slow profile source, injected at
//! construction. Run with `RUST_LOG=debug` to watch the populate, the stale
//! serving and the background refresh.

use memoflight::{CacheConfig, SingleFlightCache, TimedValue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct Profile {
    id: String,
    login: String,
    name: String,
    web: String,
}

#[derive(Debug, thiserror::Error)]
enum ProfileError {
    #[error("profile source unavailable")]
    Unavailable,
}

trait ProfileSource: Send + Sync + 'static {
    fn fetch_profile(&self, id: &str) -> Result<Profile, ProfileError>;
}

/// Simulates a remote lookup that takes a second.
struct SlowProfileSource {
    lookups: AtomicUsize,
}

impl ProfileSource for SlowProfileSource {
    fn fetch_profile(&self, id: &str) -> Result<Profile, ProfileError> {
        let lookup = self.lookups.fetch_add(1, Ordering::SeqCst) + 1;
        println!("Fetching profile {id} (lookup #{lookup})...");
        thread::sleep(Duration::from_secs(1));
        if id.is_empty() {
            return Err(ProfileError::Unavailable);
        }
        Ok(Profile {
            id: id.to_string(),
            login: "profile-owner".to_string(),
            name: format!("Profile #{id} v{lookup}"),
            web: format!("https://profiles.example.com/{id}"),
        })
    }
}

struct ProfileService<S> {
    profile_id: String,
    source: Arc<S>,
    cache: SingleFlightCache<Arc<Profile>>,
}

impl<S: ProfileSource> ProfileService<S> {
    fn new(profile_id: &str, source: S, cache: SingleFlightCache<Arc<Profile>>) -> Self {
        Self {
            profile_id: profile_id.to_string(),
            source: Arc::new(source),
            cache,
        }
    }

    fn profile(&self) -> Result<Arc<Profile>, memoflight::CacheError> {
        let source = Arc::clone(&self.source);
        let id = self.profile_id.clone();
        self.cache
            .get_or_refresh(move || source.fetch_profile(&id).map(Arc::new))
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("=== Profile Service Example ===\n");

    let cache = SingleFlightCache::with_config(
        CacheConfig::new(Duration::from_secs(10 * 60)).with_name("profiles"),
    );
    let service = Arc::new(ProfileService::new(
        "123",
        SlowProfileSource {
            lookups: AtomicUsize::new(0),
        },
        cache.clone(),
    ));

    println!("--- Step 1: ten concurrent requests on an empty cache ---");
    let handles: Vec<_> = (0..10)
        .map(|i| {
            let service = Arc::clone(&service);
            thread::spawn(move || match service.profile() {
                Ok(profile) => println!("  request {i}: {}", profile.name),
                Err(err) => println!("  request {i}: error {err}"),
            })
        })
        .collect();
    for handle in handles {
        handle.join().ok();
    }

    println!("\n--- Step 2: the profile expires ---");
    if let Some(current) = cache.snapshot() {
        let expired = Arc::clone(current.raw_value());
        cache.force_replace(TimedValue::new(expired, Duration::from_millis(1)));
    }
    thread::sleep(Duration::from_millis(10));

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let service = Arc::clone(&service);
            thread::spawn(move || match service.profile() {
                Ok(profile) => println!("  request {i}: {} (served immediately)", profile.name),
                Err(err) => println!("  request {i}: error {err}"),
            })
        })
        .collect();
    for handle in handles {
        handle.join().ok();
    }

    println!("\n--- Step 3: after the background refresh ---");
    thread::sleep(Duration::from_millis(1500));
    match service.profile() {
        Ok(profile) => println!(
            "  {} / {} / {} / {}",
            profile.id, profile.login, profile.name, profile.web
        ),
        Err(err) => println!("  error {err}"),
    }

    #[cfg(feature = "stats")]
    println!("\nCache stats: {}", cache.stats());

    println!("\n✅ Only two lookups were made for twenty-one requests");
}
