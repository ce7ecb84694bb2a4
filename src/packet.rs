use crate::{
    quantities::{NodeId, PacketId},
    registry::KindName,
    simulation::Kinds,
};

pub const DATA_PACKET: KindName = "data";
pub const CTRL_PACKET: KindName = "ctrl";
pub const DATA_HEADER: KindName = "data_header";
pub const CTRL_HEADER: KindName = "ctrl_header";
pub const DATA_PAYLOAD: KindName = "data_payload";
pub const CTRL_PAYLOAD: KindName = "ctrl_payload";

/// Addressing information carried by every packet.
///
/// All four fields start out as [`NodeId::BROADCAST`], the "unset"
/// placeholder; whoever injects the packet fills them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub kind: KindName,
    pub src: NodeId,
    pub dst: NodeId,
    pub pre: NodeId,
    pub nex: NodeId,
}

impl Header {
    #[must_use]
    pub const fn new(kind: KindName) -> Header {
        Header {
            kind,
            src: NodeId::BROADCAST,
            dst: NodeId::BROADCAST,
            pre: NodeId::BROADCAST,
            nex: NodeId::BROADCAST,
        }
    }
}

/// Variant-specific packet content. Both in-scope kinds carry a free-form
/// message string; control packets use it to encode a table update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub kind: KindName,
    pub msg: String,
}

impl Payload {
    #[must_use]
    pub const fn new(kind: KindName) -> Payload {
        Payload {
            kind,
            msg: String::new(),
        }
    }
}

/// One header plus one payload, owned together, with a process-wide
/// unique identity.
///
/// Packets are only ever produced by [`crate::simulation::Simulation`]
/// (`create_packet` / `replicate`) so that every instance traces back to
/// a registered kind and the live-packet count stays consistent. A
/// replica keeps the original's identity: conceptually it is the same
/// packet continuing its journey across a hop.
#[derive(Debug)]
pub struct Packet {
    kind: KindName,
    id: PacketId,
    header: Header,
    payload: Payload,
}

impl Packet {
    pub(crate) const fn assemble(
        kind: KindName,
        id: PacketId,
        header: Header,
        payload: Payload,
    ) -> Packet {
        Packet {
            kind,
            id,
            header,
            payload,
        }
    }

    /// Value copy sharing the identity. Callers go through
    /// `Simulation::replicate`, which also bumps the live count.
    pub(crate) fn value_copy(&self) -> Packet {
        Packet {
            kind: self.kind,
            id: self.id,
            header: self.header.clone(),
            payload: self.payload.clone(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> KindName {
        self.kind
    }

    #[must_use]
    pub const fn id(&self) -> PacketId {
        self.id
    }

    #[must_use]
    pub const fn header(&self) -> &Header {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    #[must_use]
    pub const fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }
}

/// Recipe for assembling a packet kind out of registered header and
/// payload kinds.
#[derive(Debug, Clone, Copy)]
pub struct PacketProto {
    pub header: KindName,
    pub payload: KindName,
}

fn data_header() -> Header {
    Header::new(DATA_HEADER)
}

fn ctrl_header() -> Header {
    Header::new(CTRL_HEADER)
}

fn data_payload() -> Payload {
    Payload::new(DATA_PAYLOAD)
}

fn ctrl_payload() -> Payload {
    Payload::new(CTRL_PAYLOAD)
}

/// Registers the standard data and control packet families.
pub fn register(kinds: &mut Kinds) {
    kinds.headers.register(DATA_HEADER, data_header);
    kinds.headers.register(CTRL_HEADER, ctrl_header);
    kinds.payloads.register(DATA_PAYLOAD, data_payload);
    kinds.payloads.register(CTRL_PAYLOAD, ctrl_payload);
    kinds.packets.register(
        DATA_PACKET,
        PacketProto {
            header: DATA_HEADER,
            payload: DATA_PAYLOAD,
        },
    );
    kinds.packets.register(
        CTRL_PACKET,
        PacketProto {
            header: CTRL_HEADER,
            payload: CTRL_PAYLOAD,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::Header;
    use crate::quantities::NodeId;

    #[test]
    fn fresh_header_is_unaddressed() {
        let header = Header::new(super::DATA_HEADER);
        assert!(header.src.is_broadcast());
        assert!(header.dst.is_broadcast());
        assert!(header.pre.is_broadcast());
        assert!(header.nex.is_broadcast());
        assert_eq!(header, header.clone());
    }

    #[test]
    fn value_copy_shares_identity() {
        let packet = super::Packet::assemble(
            super::DATA_PACKET,
            crate::quantities::PacketId(7),
            Header::new(super::DATA_HEADER),
            super::Payload::new(super::DATA_PAYLOAD),
        );
        let mut copy = packet.value_copy();
        copy.header_mut().dst = NodeId::new(3);
        assert_eq!(copy.id(), packet.id());
        assert_eq!(copy.kind(), packet.kind());
        assert!(packet.header().dst.is_broadcast());
    }
}
