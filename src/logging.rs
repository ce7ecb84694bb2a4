use std::{cell::RefCell, fmt::Display, rc::Rc};

use crate::{
    quantities::{NodeId, PacketId, Time},
    registry::KindName,
    simulation::Event,
};

/// Sink for diagnostic messages (non-fatal errors, dropped packets).
pub trait Logger {
    fn log(&mut self, msg: &str);
}

impl<'a, T> Logger for &'a mut T
where
    T: Logger,
{
    fn log(&mut self, msg: &str) {
        T::log(self, msg);
    }
}

pub struct PrintLogger {
    name: String,
}

impl PrintLogger {
    #[must_use]
    pub const fn new(name: String) -> PrintLogger {
        PrintLogger { name }
    }
}

impl Logger for PrintLogger {
    fn log(&mut self, msg: &str) {
        eprintln!("[{}] {}", self.name, msg);
    }
}

pub struct NothingLogger;

impl Logger for NothingLogger {
    fn log(&mut self, _msg: &str) {}
}

/// One line of the run trace, emitted for every triggered event.
///
/// Together the records are sufficient to reconstruct the full journey
/// of every packet in the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub time: Time,
    pub event: KindName,
    pub sender: NodeId,
    pub receiver: NodeId,
    pub packet: PacketId,
    pub src: NodeId,
    pub dst: NodeId,
    pub pre: NodeId,
    pub nex: NodeId,
    pub packet_kind: KindName,
}

impl TraceRecord {
    #[must_use]
    pub fn of(time: Time, event: &Event) -> TraceRecord {
        let header = event.packet.header();
        TraceRecord {
            time,
            event: event.kind,
            sender: event.sender,
            receiver: event.receiver,
            packet: event.packet.id(),
            src: header.src,
            dst: header.dst,
            pre: header.pre,
            nex: header.nex,
            packet_kind: event.packet.kind(),
        }
    }
}

impl Display for TraceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "time {:>11}   {:<4}   sen {:>11}   rec {:>11}   pkt {:>11}   src {:>11}   dst {:>11}   pre {:>11}   nex {:>11}   {}",
            self.time,
            self.event,
            self.sender,
            self.receiver,
            self.packet,
            self.src,
            self.dst,
            self.pre,
            self.nex,
            self.packet_kind,
        )
    }
}

/// Consumer of [`TraceRecord`]s produced by the event loop.
pub trait TraceSink {
    fn record(&mut self, record: &TraceRecord);
}

pub struct PrintTrace;

impl TraceSink for PrintTrace {
    fn record(&mut self, record: &TraceRecord) {
        println!("{record}");
    }
}

pub struct NothingTrace;

impl TraceSink for NothingTrace {
    fn record(&mut self, _record: &TraceRecord) {}
}

/// Collects records in memory; the handle stays valid after the sink is
/// handed to the simulation, so tests can inspect the finished trace.
#[derive(Default)]
pub struct VecTrace {
    records: Rc<RefCell<Vec<TraceRecord>>>,
}

impl VecTrace {
    #[must_use]
    pub fn new() -> VecTrace {
        VecTrace::default()
    }

    #[must_use]
    pub fn handle(&self) -> Rc<RefCell<Vec<TraceRecord>>> {
        Rc::clone(&self.records)
    }
}

impl TraceSink for VecTrace {
    fn record(&mut self, record: &TraceRecord) {
        self.records.borrow_mut().push(record.clone());
    }
}
