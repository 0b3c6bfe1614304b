use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cards::CardService;

// ─── Report types ────────────────────────────────────────────────

/// What happened to one card during a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct CardOutcome {
    pub card_number: String,
    pub valid: bool,
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub requested: u32,
    pub concurrency: u32,
    pub delete_failures: u32,
    pub cards: Vec<CardOutcome>,
}

// ─── Public entry point ──────────────────────────────────────────

/// Runs `count` cards through create → update → validate → delete using
/// `concurrency` Tokio tasks that pull card indices from a shared counter.
pub async fn run(cards: Arc<CardService>, count: u32, concurrency: u32) -> BatchReport {
    let next = Arc::new(AtomicU32::new(1));
    let workers = concurrency.clamp(1, count.max(1));

    let mut handles = Vec::with_capacity(workers as usize);
    for _ in 0..workers {
        let cards = cards.clone();
        let next = next.clone();
        handles.push(tokio::spawn(async move { worker(cards, next, count).await }));
    }

    let mut outcomes = Vec::with_capacity(count as usize);
    for h in handles {
        match h.await {
            Ok(part) => outcomes.extend(part),
            Err(e) => warn!(error = %e, "batch worker aborted"),
        }
    }
    outcomes.sort_by_key(|(i, _)| *i);

    let cards: Vec<CardOutcome> = outcomes.into_iter().map(|(_, o)| o).collect();
    let delete_failures = cards.iter().filter(|c| !c.deleted).count() as u32;
    info!(count, workers, delete_failures, "card batch finished");

    BatchReport {
        requested: count,
        concurrency: workers,
        delete_failures,
        cards,
    }
}

// ─── Worker loop ─────────────────────────────────────────────────

async fn worker(
    cards: Arc<CardService>,
    next: Arc<AtomicU32>,
    count: u32,
) -> Vec<(u32, CardOutcome)> {
    let mut done = Vec::new();
    loop {
        let i = next.fetch_add(1, Ordering::Relaxed);
        if i > count {
            break;
        }
        done.push((i, process_card(&cards, i).await));
    }
    done
}

async fn process_card(cards: &CardService, i: u32) -> CardOutcome {
    let card_number = format!("CARD-{i:03}");

    // create/update/validate cannot fail; only the delete can
    let _ = cards.create(&card_number, "TEST").await;
    let _ = cards.update(&card_number, &format!("Updated data {i}")).await;
    let valid = cards.validate(&card_number).await.unwrap_or(false);

    match cards.delete(&card_number).await {
        Ok(()) => CardOutcome {
            card_number,
            valid,
            deleted: true,
            error: None,
        },
        Err(e) => CardOutcome {
            card_number,
            valid,
            deleted: false,
            error: Some(e.to_string()),
        },
    }
}
