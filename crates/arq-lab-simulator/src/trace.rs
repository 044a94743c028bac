use arq_lab_abstract::SimConfig;
use serde::Serialize;

use crate::engine::LinkEventSummary;

/// Channel and timer counters accumulated over one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChannelStats {
    pub lost: u32,
    pub corrupted: u32,
    /// Offers the sender refused (window full or busy); each re-offer counts.
    pub refused_offers: u32,
    pub timeouts: u32,
    /// Timer starts that left a node with more than one live timer.
    pub timer_overlaps: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub duration: f64,
    pub delivered_data: Vec<String>,
    pub sender_packet_count: u32,
    pub receiver_packet_count: u32,
    pub undelivered_backlog: usize,
    pub stats: ChannelStats,
    pub link_events: Vec<LinkEventSummary>,
}
