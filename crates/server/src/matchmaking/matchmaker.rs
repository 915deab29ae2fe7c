//! Matchmaker (C7), grounded on
//! `original_source/src/server/matchmaking/matchmaker.cpp`/`.hpp`: the
//! staged bot-fill fractions, per-iteration `QueueStatusUpdate` emission,
//! and match formation. Queue FIFO pop is `t2d::net::session::SessionRegistry`'s
//! `snapshot_queue`/`pop_from_queue` pair (teacher's `Queue` FIFO shape,
//! see DESIGN.md).

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use t2d::domain::MatchConfig;
use t2d::net::protocol::ServerMessage;
use t2d::net::session::{SessionHandle, SharedRegistry};
use t2d::Metrics;

use crate::matchmaking::match_runtime::{MatchRuntime, Participant};
use crate::shutdown::Shutdown;

/// Staged bot-fill target fraction, a step function of `waited /
/// fill_timeout_seconds` (SPEC_FULL §4.7 step 3).
fn target_fraction(frac: f64) -> f64 {
    if frac >= 1.0 {
        1.0
    } else if frac >= 0.75 {
        0.75
    } else if frac >= 0.5 {
        0.5
    } else if frac >= 0.25 {
        0.25
    } else {
        0.0
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn run(
    registry: SharedRegistry,
    metrics: Arc<Metrics>,
    match_config: MatchConfig,
    fill_timeout_seconds: u64,
    max_parallel_matches: u32,
    poll_interval_ms: u64,
    shutdown: Shutdown,
) {
    let poll_interval = Duration::from_millis(poll_interval_ms);
    let mut next_match_id: u64 = 1;

    loop {
        if shutdown.is_set() {
            break;
        }
        tokio::time::sleep(poll_interval).await;
        if shutdown.is_set() {
            break;
        }

        run_iteration(
            &registry,
            &metrics,
            &match_config,
            fill_timeout_seconds,
            max_parallel_matches,
            &mut next_match_id,
            &shutdown,
        );
    }
}

fn run_iteration(
    registry: &SharedRegistry,
    metrics: &Arc<Metrics>,
    match_config: &MatchConfig,
    fill_timeout_seconds: u64,
    max_parallel_matches: u32,
    next_match_id: &mut u64,
    shutdown: &Shutdown,
) {
    let max_players = match_config.max_players_per_match;

    let (queue, earliest_join) = {
        let reg = registry.lock().unwrap();
        let queue = reg.snapshot_queue();
        let earliest = queue
            .iter()
            .filter_map(|h| reg.get(*h).and_then(|s| s.queue_joined_at))
            .min();
        (queue, earliest)
    };
    metrics
        .queue_depth
        .store(queue.len() as u64, Ordering::Relaxed);

    let waited_secs = earliest_join
        .map(|t| t.elapsed().as_secs_f64())
        .unwrap_or(0.0);

    // Staged bot fill.
    if !queue.is_empty() && queue.len() < max_players as usize && fill_timeout_seconds > 0 {
        let frac = waited_secs / fill_timeout_seconds as f64;
        let target = target_fraction(frac);
        let target_count = (target * max_players as f64).ceil() as usize;
        if queue.len() < target_count {
            let mut reg = registry.lock().unwrap();
            reg.create_bots((target_count - queue.len()) as u32);
        }
    }

    // Lobby status: re-snapshot since bot fill may have grown the queue.
    let queue_after_fill = { registry.lock().unwrap().snapshot_queue() };
    let players_in_queue = queue_after_fill.len() as u32;
    let needed_for_match = max_players.saturating_sub(players_in_queue);
    let timeout_seconds_left = ((fill_timeout_seconds as f64 - waited_secs).max(0.0)) as u32;
    let projected_bot_fill = needed_for_match;

    {
        let mut reg = registry.lock().unwrap();
        for (i, handle) in queue_after_fill.iter().enumerate() {
            let is_bot = reg.get(*handle).map(|s| s.is_bot).unwrap_or(true);
            if is_bot {
                continue;
            }
            reg.push_message(
                *handle,
                ServerMessage::QueueStatusUpdate {
                    position: i as u32 + 1,
                    players_in_queue,
                    needed_for_match,
                    timeout_seconds_left,
                    lobby_state: "waiting".to_string(),
                    lobby_countdown: timeout_seconds_left,
                    projected_bot_fill,
                },
            );
        }
    }

    // Form a match once the queue has enough participants, subject to the
    // parallel-match cap.
    let active_matches = metrics.active_matches.load(Ordering::Relaxed) as u32;
    if queue_after_fill.len() >= max_players as usize
        && (max_parallel_matches == 0 || active_matches < max_parallel_matches)
    {
        form_match(registry, metrics, match_config, next_match_id, queue_after_fill, shutdown);
    }
}

fn form_match(
    registry: &SharedRegistry,
    metrics: &Arc<Metrics>,
    match_config: &MatchConfig,
    next_match_id: &mut u64,
    queue_after_fill: Vec<SessionHandle>,
    shutdown: &Shutdown,
) {
    let max_players = match_config.max_players_per_match as usize;

    let selected: Vec<SessionHandle> = {
        let mut reg = registry.lock().unwrap();
        let take: Vec<SessionHandle> = queue_after_fill.into_iter().take(max_players).collect();
        reg.pop_from_queue(&take);
        take
    };

    let match_id = *next_match_id;
    *next_match_id += 1;
    let seed = rand::random::<u64>();

    // Floor damage and cap the bot-fire interval for this match only
    // (SPEC_FULL §4.7 step 5); the configured defaults are left untouched.
    let mut match_config = *match_config;
    match_config.projectile_damage = match_config.projectile_damage.max(50);
    match_config.bot_fire_interval_ticks = match_config.bot_fire_interval_ticks.min(5);
    let match_config = &match_config;

    let participants: Vec<Participant> = {
        let reg = registry.lock().unwrap();
        selected
            .iter()
            .map(|h| Participant {
                session: *h,
                is_bot: reg.get(*h).map(|s| s.is_bot).unwrap_or(false),
            })
            .collect()
    };

    for (i, handle) in selected.iter().enumerate() {
        registry
            .lock()
            .unwrap()
            .set_match(*handle, match_id, i as u32 + 1);
    }

    {
        let mut reg = registry.lock().unwrap();
        for handle in &selected {
            reg.push_message(
                *handle,
                ServerMessage::MatchStart {
                    match_id,
                    tick_rate: match_config.tick_rate,
                    seed,
                },
            );
        }
    }

    let mut runtime = MatchRuntime::new(match_id, *match_config, participants);
    let baseline = runtime.baseline_snapshot();
    {
        let mut reg = registry.lock().unwrap();
        for handle in &selected {
            reg.push_message(*handle, baseline.clone());
        }
    }

    let registry = registry.clone();
    let metrics = metrics.clone();
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        runtime.run(registry, metrics, shutdown).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_fraction_is_a_step_function() {
        assert_eq!(target_fraction(0.1), 0.0);
        assert_eq!(target_fraction(0.25), 0.25);
        assert_eq!(target_fraction(0.5), 0.5);
        assert_eq!(target_fraction(0.75), 0.75);
        assert_eq!(target_fraction(1.0), 1.0);
        assert_eq!(target_fraction(2.0), 1.0);
    }
}
