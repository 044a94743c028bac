use crate::source;
use crate::trace::{ChannelStats, SimulationReport};
use arq_lab_abstract::{Message, NetworkHost, Packet, SenderHost, SimConfig, SystemContext};
use arq_lab_abstract::{Admission, PacketError, TimerHandle};
use rand::Rng;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use tracing::{debug, info, warn};

/// Value written into a header field when the channel corrupts it.
const CORRUPTED_FIELD: i32 = 999_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeId {
    Sender,
    Receiver,
}

impl NodeId {
    pub fn peer(&self) -> Self {
        match self {
            NodeId::Sender => NodeId::Receiver,
            NodeId::Receiver => NodeId::Sender,
        }
    }
}

#[derive(Debug)]
pub enum EventType {
    PacketArrival { to: NodeId, packet: Packet },
    TimerExpiry { node: NodeId, handle: TimerHandle },
    AppSend { message: Message },
}

#[derive(Debug)]
struct Event {
    time: f64,
    event_type: EventType,
    id: u64, // Unique ID to differentiate events at same time
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// A compact textual summary of important link-layer events.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEventSummary {
    pub time: f64,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    Drop,
    Corrupt,
}

#[derive(Debug)]
enum TimerAction {
    Start { handle: TimerHandle, duration: f64 },
    Stop(TimerHandle),
}

/// Actions buffered during one endpoint call
#[derive(Default)]
struct ActionBuffer {
    outgoing_packets: Vec<Packet>,
    timer_actions: Vec<TimerAction>,
    logs: Vec<String>,
    delivered_data: Vec<String>,
}

/// Context implementation passed to the endpoint
struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
    next_timer: &'a mut u64,
    now: f64,
}

impl<'a> SystemContext for ScopedContext<'a> {
    fn send_packet(&mut self, packet: Packet) {
        self.buffer.outgoing_packets.push(packet);
    }

    fn start_timer(&mut self, duration: f64) -> TimerHandle {
        *self.next_timer += 1;
        let handle = TimerHandle(*self.next_timer);
        self.buffer
            .timer_actions
            .push(TimerAction::Start { handle, duration });
        handle
    }

    fn stop_timer(&mut self, handle: TimerHandle) {
        self.buffer.timer_actions.push(TimerAction::Stop(handle));
    }

    fn deliver_data(&mut self, data: &str) {
        self.buffer.delivered_data.push(data.to_string());
    }

    fn log(&mut self, message: &str) {
        self.buffer.logs.push(message.to_string());
    }

    fn now(&self) -> f64 {
        self.now
    }
}

pub struct Simulator {
    time: f64,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,

    config: SimConfig,
    rng: rand::rngs::StdRng,

    sender: Box<dyn SenderHost>,
    receiver: Box<dyn NetworkHost>,

    /// Messages the sender refused, oldest first. Re-offered after every sender event.
    app_backlog: VecDeque<Message>,

    next_timer: u64,
    /// Timers started and not yet stopped or expired.
    live_timers: HashMap<TimerHandle, NodeId>,

    /// Latest scheduled arrival per destination, used when `preserve_order` is set.
    last_arrival: HashMap<NodeId, f64>,

    // Deterministic fault injection, each rule fires once
    sender_faults: Vec<(i32, Fault)>,
    receiver_faults: Vec<(i32, Fault)>,

    pub delivered_data: Vec<String>,
    pub sender_packet_count: u32,
    pub receiver_packet_count: u32,
    pub stats: ChannelStats,

    /// Timeline of link events (drops, corruptions, sends, deliveries).
    pub link_events: Vec<LinkEventSummary>,
}

impl Simulator {
    pub fn new(
        config: SimConfig,
        sender: Box<dyn SenderHost>,
        receiver: Box<dyn NetworkHost>,
    ) -> Self {
        use rand::SeedableRng;
        let rng = rand::rngs::StdRng::seed_from_u64(config.seed);

        Self {
            time: 0.0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            config,
            rng,
            sender,
            receiver,
            app_backlog: VecDeque::new(),
            next_timer: 0,
            live_timers: HashMap::new(),
            last_arrival: HashMap::new(),
            sender_faults: Vec::new(),
            receiver_faults: Vec::new(),
            delivered_data: Vec::new(),
            sender_packet_count: 0,
            receiver_packet_count: 0,
            stats: ChannelStats::default(),
            link_events: Vec::new(),
        }
    }

    /// Drop the first packet sent by Sender whose seq equals `seq`.
    pub fn add_drop_sender_seq_once(&mut self, seq: i32) {
        self.sender_faults.push((seq, Fault::Drop));
    }

    /// Drop the first ACK sent by Receiver whose ack equals `ack`.
    pub fn add_drop_receiver_ack_once(&mut self, ack: i32) {
        self.receiver_faults.push((ack, Fault::Drop));
    }

    /// Corrupt the first packet sent by Sender whose seq equals `seq`.
    pub fn add_corrupt_sender_seq_once(&mut self, seq: i32) {
        self.sender_faults.push((seq, Fault::Corrupt));
    }

    /// Corrupt the first ACK sent by Receiver whose ack equals `ack`.
    pub fn add_corrupt_receiver_ack_once(&mut self, ack: i32) {
        self.receiver_faults.push((ack, Fault::Corrupt));
    }

    fn push_event(&mut self, time: f64, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    pub fn schedule_app_send(&mut self, time: f64, message: Message) {
        self.push_event(time, EventType::AppSend { message });
    }

    /// Schedule `config.message_count` generated messages with uniformly random
    /// gaps averaging `config.message_interval`.
    pub fn schedule_generated_messages(&mut self) -> Result<(), PacketError> {
        let mut time = self.time;
        let spread = 2.0 * self.config.message_interval;
        for index in 0..self.config.message_count {
            if spread > 0.0 {
                time += self.rng.random_range(0.0..spread);
            }
            self.schedule_app_send(time, source::generated_message(index)?);
        }
        Ok(())
    }

    pub fn init(&mut self) {
        let mut buffer = ActionBuffer::default();
        {
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                next_timer: &mut self.next_timer,
                now: self.time,
            };
            self.sender.init(&mut ctx);
        }
        self.process_actions(NodeId::Sender, buffer);

        let mut buffer = ActionBuffer::default();
        {
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                next_timer: &mut self.next_timer,
                now: self.time,
            };
            self.receiver.init(&mut ctx);
        }
        self.process_actions(NodeId::Receiver, buffer);
    }

    pub fn current_time(&self) -> f64 {
        self.time
    }

    /// Events still queued (arrivals, timer expiries and app sends).
    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Messages refused by the sender and still waiting to be re-offered.
    pub fn backlog_len(&self) -> usize {
        self.app_backlog.len()
    }

    /// Process the next event. Returns true if an event was processed, false if queue is empty.
    pub fn step(&mut self) -> bool {
        let event = match self.event_queue.pop() {
            Some(e) => e,
            None => return false,
        };

        self.time = event.time;
        debug!("Processing event at {:.3}: {:?}", self.time, event.event_type);

        match event.event_type {
            EventType::PacketArrival { to, packet } => {
                let mut buffer = ActionBuffer::default();
                {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        next_timer: &mut self.next_timer,
                        now: self.time,
                    };
                    match to {
                        NodeId::Sender => self.sender.input(&mut ctx, packet),
                        NodeId::Receiver => self.receiver.input(&mut ctx, packet),
                    }
                }
                self.process_actions(to, buffer);
                if to == NodeId::Sender {
                    self.offer_backlog();
                }
            }
            EventType::TimerExpiry { node, handle } => {
                if self.live_timers.remove(&handle).is_none() {
                    debug!("Skipping stopped timer {:?}", handle);
                    return true; // Event processed (by being ignored)
                }
                if node == NodeId::Receiver {
                    warn!("Receiver timer {:?} expired; receivers have no timer handler", handle);
                    return true;
                }

                self.stats.timeouts += 1;
                let mut buffer = ActionBuffer::default();
                {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        next_timer: &mut self.next_timer,
                        now: self.time,
                    };
                    self.sender.timer_interrupt(&mut ctx, handle);
                }
                self.process_actions(NodeId::Sender, buffer);
                self.offer_backlog();
            }
            EventType::AppSend { message } => {
                self.app_backlog.push_back(message);
                self.offer_backlog();
            }
        }
        true
    }

    /// Offer queued application messages, in order, until the sender refuses one.
    fn offer_backlog(&mut self) {
        while let Some(message) = self.app_backlog.front().cloned() {
            let mut buffer = ActionBuffer::default();
            let admission = {
                let mut ctx = ScopedContext {
                    buffer: &mut buffer,
                    next_timer: &mut self.next_timer,
                    now: self.time,
                };
                self.sender.output(&mut ctx, message)
            };
            self.process_actions(NodeId::Sender, buffer);

            match admission {
                Admission::Accepted => {
                    self.app_backlog.pop_front();
                }
                Admission::Refused => {
                    self.stats.refused_offers += 1;
                    break;
                }
            }
        }
    }

    /// Produce a serializable snapshot of the current simulation state.
    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            duration: self.time,
            delivered_data: self.delivered_data.clone(),
            sender_packet_count: self.sender_packet_count,
            receiver_packet_count: self.receiver_packet_count,
            undelivered_backlog: self.app_backlog.len(),
            stats: self.stats.clone(),
            link_events: self.link_events.clone(),
        }
    }

    pub fn run_until_complete(&mut self) {
        self.init();
        while self.step() {}
    }

    fn process_actions(&mut self, source_node: NodeId, buffer: ActionBuffer) {
        for log in buffer.logs {
            info!("[{:?}] {}", source_node, log);
        }

        for data in buffer.delivered_data {
            if source_node == NodeId::Sender {
                warn!("[Sender] delivered data to the application layer");
            }
            info!("[{:?}] DELIVERED DATA: {:?}", source_node, data);
            self.link_events.push(LinkEventSummary {
                time: self.time,
                description: format!(
                    "[{:?}] DELIVERED {:?} to application",
                    source_node, data
                ),
            });
            self.delivered_data.push(data);
        }

        for action in buffer.timer_actions {
            match action {
                TimerAction::Start { handle, duration } => {
                    if source_node == NodeId::Receiver {
                        warn!("[Receiver] started a timer");
                    }
                    self.live_timers.insert(handle, source_node);
                    let live = self
                        .live_timers
                        .values()
                        .filter(|node| **node == source_node)
                        .count();
                    if live > 1 {
                        warn!(
                            "[{:?}] started timer {:?} while {} other timer(s) are live",
                            source_node,
                            handle,
                            live - 1
                        );
                        self.stats.timer_overlaps += 1;
                    }
                    self.push_event(
                        self.time + duration,
                        EventType::TimerExpiry {
                            node: source_node,
                            handle,
                        },
                    );
                }
                TimerAction::Stop(handle) => {
                    if self.live_timers.remove(&handle).is_none() {
                        debug!("[{:?}] stopped inactive timer {:?}", source_node, handle);
                    }
                }
            }
        }

        // Packet transmission logic (Channel)
        for mut packet in buffer.outgoing_packets {
            let (faults, key) = match source_node {
                NodeId::Sender => {
                    self.sender_packet_count += 1;
                    (&mut self.sender_faults, packet.seq_num)
                }
                NodeId::Receiver => {
                    self.receiver_packet_count += 1;
                    (&mut self.receiver_faults, packet.ack_num)
                }
            };
            let target_node = source_node.peer();

            let forced = faults
                .iter()
                .position(|(k, _)| *k == key)
                .map(|pos| faults.remove(pos).1);

            // 1. Check Loss
            if forced == Some(Fault::Drop) || self.rng.random::<f64>() < self.config.loss_rate {
                let cause = if forced == Some(Fault::Drop) {
                    "deterministic"
                } else {
                    "random loss"
                };
                self.link_events.push(LinkEventSummary {
                    time: self.time,
                    description: format!(
                        "[{:?}->{:?}] DROP ({}) seq={} ack={}",
                        source_node, target_node, cause, packet.seq_num, packet.ack_num
                    ),
                });
                debug!("Packet lost in channel ({})", cause);
                self.stats.lost += 1;
                continue;
            }

            // 2. Check Corruption
            if forced == Some(Fault::Corrupt)
                || self.rng.random::<f64>() < self.config.corrupt_rate
            {
                self.link_events.push(LinkEventSummary {
                    time: self.time,
                    description: format!(
                        "[{:?}->{:?}] CORRUPT seq={} ack={}",
                        source_node, target_node, packet.seq_num, packet.ack_num
                    ),
                });
                self.corrupt(&mut packet);
                debug!("Packet corrupted in channel: {:?}", packet);
                self.stats.corrupted += 1;
            }

            // 3. Calculate Latency
            let latency = if self.config.max_latency > self.config.min_latency {
                self.rng
                    .random_range(self.config.min_latency..self.config.max_latency)
            } else {
                self.config.min_latency
            };
            let mut arrival_time = self.time + latency;
            if self.config.preserve_order
                && let Some(&last) = self.last_arrival.get(&target_node)
            {
                arrival_time = arrival_time.max(last);
            }
            self.last_arrival.insert(target_node, arrival_time);

            self.link_events.push(LinkEventSummary {
                time: self.time,
                description: format!(
                    "[{:?}->{:?}] SEND seq={} ack={} (arrives at {:.3})",
                    source_node, target_node, packet.seq_num, packet.ack_num, arrival_time
                ),
            });

            self.push_event(
                arrival_time,
                EventType::PacketArrival {
                    to: target_node,
                    packet,
                },
            );
        }
    }

    /// Alter one field of `packet`: usually the first payload character,
    /// otherwise the sequence or acknowledgment number.
    fn corrupt(&mut self, packet: &mut Packet) {
        let roll = self.rng.random::<f64>();
        if roll < 0.75 {
            match packet.payload.chars().next() {
                Some(first) => {
                    let replacement = if first == 'Z' { "z" } else { "Z" };
                    packet.payload.replace_range(..first.len_utf8(), replacement);
                }
                None => packet.payload.push('Z'),
            }
        } else if roll < 0.875 {
            packet.seq_num = CORRUPTED_FIELD;
        } else {
            packet.ack_num = CORRUPTED_FIELD;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Simulator;
    use arq_lab_abstract::{
        Admission, Message, NetworkHost, Packet, SenderHost, SimConfig, SystemContext,
        TimerHandle,
    };
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Observed {
        fired: Vec<TimerHandle>,
        received: Vec<Packet>,
        offered: Vec<String>,
    }

    /// Sender that starts two timers at init, cancels the first from the
    /// second's expiry, and accepts at most `capacity` messages.
    struct ProbeSender {
        seen: Rc<RefCell<Observed>>,
        first: Option<TimerHandle>,
        capacity: usize,
    }

    impl NetworkHost for ProbeSender {
        fn init(&mut self, ctx: &mut dyn SystemContext) {
            self.first = Some(ctx.start_timer(10.0));
            ctx.start_timer(5.0);
        }

        fn input(&mut self, _ctx: &mut dyn SystemContext, packet: Packet) {
            self.capacity += 1;
            self.seen.borrow_mut().received.push(packet);
        }
    }

    impl SenderHost for ProbeSender {
        fn output(&mut self, ctx: &mut dyn SystemContext, message: Message) -> Admission {
            if self.capacity == 0 {
                return Admission::Refused;
            }
            self.capacity -= 1;
            self.seen.borrow_mut().offered.push(message.data().to_string());
            ctx.send_packet(Packet::new(0, 0, 0, message.into_data()));
            Admission::Accepted
        }

        fn timer_interrupt(&mut self, ctx: &mut dyn SystemContext, handle: TimerHandle) {
            self.seen.borrow_mut().fired.push(handle);
            if let Some(first) = self.first.take() {
                ctx.stop_timer(first);
            }
        }
    }

    /// Receiver that delivers every payload and echoes an ACK.
    struct EchoReceiver;

    impl NetworkHost for EchoReceiver {
        fn input(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
            ctx.deliver_data(&packet.payload);
            ctx.send_packet(Packet::new_ack(packet.seq_num, 0));
        }
    }

    fn probe(capacity: usize) -> (Box<ProbeSender>, Rc<RefCell<Observed>>) {
        let seen = Rc::new(RefCell::new(Observed::default()));
        let sender = ProbeSender {
            seen: Rc::clone(&seen),
            first: None,
            capacity,
        };
        (Box::new(sender), seen)
    }

    #[test]
    fn stopped_timer_does_not_fire() {
        let (sender, seen) = probe(0);
        let mut sim = Simulator::new(SimConfig::default(), sender, Box::new(EchoReceiver));
        sim.run_until_complete();

        // Only the 5-unit timer fires; it stops the 10-unit one.
        assert_eq!(seen.borrow().fired, vec![TimerHandle(2)]);
        assert_eq!(sim.stats.timeouts, 1);
        assert_eq!(sim.stats.timer_overlaps, 1);
    }

    #[test]
    fn refused_messages_are_reoffered_in_order() {
        let (sender, seen) = probe(1);
        let mut sim = Simulator::new(SimConfig::default(), sender, Box::new(EchoReceiver));
        for (t, data) in [(0.0, "one"), (0.5, "two"), (0.7, "three")] {
            sim.schedule_app_send(t, Message::new(data).unwrap());
        }
        sim.run_until_complete();

        assert_eq!(seen.borrow().offered, vec!["one", "two", "three"]);
        assert_eq!(sim.delivered_data, vec!["one", "two", "three"]);
        assert_eq!(sim.backlog_len(), 0);
        assert!(sim.stats.refused_offers >= 2);
    }

    #[test]
    fn deterministic_drop_and_corrupt_apply_once() {
        let (sender, seen) = probe(10);
        let config = SimConfig {
            preserve_order: true,
            ..Default::default()
        };
        let mut sim = Simulator::new(config, sender, Box::new(EchoReceiver));
        sim.add_drop_sender_seq_once(0);
        sim.add_corrupt_receiver_ack_once(0);
        sim.schedule_app_send(0.0, Message::new("a").unwrap());
        sim.schedule_app_send(1.0, Message::new("b").unwrap());
        sim.schedule_app_send(2.0, Message::new("c").unwrap());
        sim.run_until_complete();

        assert_eq!(sim.delivered_data, vec!["b", "c"]);
        assert_eq!(sim.stats.lost, 1);
        assert_eq!(sim.stats.corrupted, 1);

        let received = &seen.borrow().received;
        assert_eq!(received.len(), 2);
        assert_ne!(received[0], Packet::new_ack(0, 0));
        assert_eq!(received[1], Packet::new_ack(0, 0));
    }

    #[test]
    fn total_loss_delivers_nothing() {
        let (sender, _seen) = probe(3);
        let config = SimConfig {
            loss_rate: 1.0,
            ..Default::default()
        };
        let mut sim = Simulator::new(config, sender, Box::new(EchoReceiver));
        sim.schedule_app_send(0.0, Message::new("x").unwrap());
        sim.run_until_complete();

        assert!(sim.delivered_data.is_empty());
        assert_eq!(sim.sender_packet_count, 1);
        assert_eq!(sim.stats.lost, 1);
    }

    #[test]
    fn preserve_order_keeps_fifo_arrivals() {
        let (sender, _seen) = probe(20);
        let config = SimConfig {
            min_latency: 1.0,
            max_latency: 50.0,
            preserve_order: true,
            seed: 7,
            ..Default::default()
        };
        let mut sim = Simulator::new(config, sender, Box::new(EchoReceiver));
        let sent: Vec<String> = (0..10).map(|i| format!("m{i}")).collect();
        for (i, data) in sent.iter().enumerate() {
            sim.schedule_app_send(i as f64 * 0.1, Message::new(data.clone()).unwrap());
        }
        sim.run_until_complete();

        assert_eq!(sim.delivered_data, sent);
    }

    #[test]
    fn generated_messages_are_scheduled() {
        let (sender, seen) = probe(100);
        let config = SimConfig {
            message_count: 5,
            message_interval: 10.0,
            ..Default::default()
        };
        let mut sim = Simulator::new(config, sender, Box::new(EchoReceiver));
        sim.schedule_generated_messages().unwrap();
        sim.run_until_complete();

        assert_eq!(seen.borrow().offered.len(), 5);
        assert_eq!(seen.borrow().offered[0], "a".repeat(arq_lab_abstract::MAX_DATA_SIZE));
        assert_eq!(seen.borrow().offered[4], "e".repeat(arq_lab_abstract::MAX_DATA_SIZE));
    }
}
