//! Lead queue selection
//!
//! An agent works through a queue source (a list or a campaign) one lead at
//! a time. The queue is the set of leads in the source that are not in a
//! terminal status and are either unclaimed or claimed by that agent,
//! ordered by creation time (ties broken by id).
//!
//! [`select`] computes a slot over leads already in memory;
//! [`QueueRepo::slot`](crate::repo::QueueRepo::slot) answers the same
//! question with one `COUNT` and one `LIMIT 1 OFFSET n` query. Both must
//! agree.

use serde::Serialize;
use crate::models::{Lead, LeadStatus};

/// Where queued leads come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueSource {
    List(i64),
    Campaign(i64),
}

impl QueueSource {
    pub fn contains(&self, lead: &Lead) -> bool {
        match self {
            QueueSource::List(id) => lead.list_id == Some(*id),
            QueueSource::Campaign(id) => lead.campaign_id == Some(*id),
        }
    }

    /// Column holding the source id
    pub(crate) fn column(&self) -> &'static str {
        match self {
            QueueSource::List(_) => "list_id",
            QueueSource::Campaign(_) => "campaign_id",
        }
    }

    pub(crate) fn id(&self) -> i64 {
        match self {
            QueueSource::List(id) | QueueSource::Campaign(id) => *id,
        }
    }
}

/// Queue ordering options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueOrder {
    /// Leads still in `new` status go first
    pub prioritise_new: bool,
}

impl QueueOrder {
    /// Sort key: (bucket, created_ts, id)
    pub fn sort_key(&self, lead: &Lead) -> (u8, i64, Option<i64>) {
        let bucket = if self.prioritise_new && lead.status != LeadStatus::New { 1 } else { 0 };
        (bucket, lead.created_ts, lead.id)
    }
}

/// The lead at one queue position plus the queue size
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueSlot {
    pub lead: Option<Lead>,
    pub index: usize,
    pub total: usize,
}

impl QueueSlot {
    /// No lead at this index: the agent has worked through the queue
    pub fn is_complete(&self) -> bool {
        self.lead.is_none()
    }

    pub fn has_next(&self) -> bool {
        self.index.saturating_add(1) < self.total
    }
}

/// All leads queued for `agent_id` in `source`, in queue order
pub fn queued<'a>(leads: &'a [Lead], source: QueueSource, agent_id: i64, order: QueueOrder) -> Vec<&'a Lead> {
    let mut queue: Vec<&Lead> = leads
        .iter()
        .filter(|lead| source.contains(lead) && lead.is_workable_by(agent_id))
        .collect();
    queue.sort_by_key(|lead| order.sort_key(lead));
    queue
}

/// Lead at zero-based `index` in the agent's queue
pub fn select(leads: &[Lead], source: QueueSource, agent_id: i64, index: usize, order: QueueOrder) -> QueueSlot {
    let queue = queued(leads, source, agent_id, order);
    QueueSlot {
        lead: queue.get(index).map(|lead| (*lead).clone()),
        index,
        total: queue.len(),
    }
}
