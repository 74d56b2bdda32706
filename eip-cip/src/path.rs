//! CIP path encoding
//!
//! A path is an ordered list of segments addressing an object inside the
//! target (logical class/instance/attribute) or routing through a module
//! (port segments). On the wire it is preceded by its size in 16-bit words
//! and always occupies an even number of bytes.
//!
//! ```text
//! class 0x06, instance 0x01:  02 | 20 06 | 24 01
//!                             ^ words
//! ```

use eip_core::{EipError, EipResult};

/// Logical segment, 8-bit class ID
pub const SEGMENT_CLASS_8BIT: u8 = 0x20;
/// Logical segment, 8-bit instance ID
pub const SEGMENT_INSTANCE_8BIT: u8 = 0x24;
/// Logical segment, 8-bit attribute ID
pub const SEGMENT_ATTRIBUTE_8BIT: u8 = 0x30;
/// Port segment flag marking a multi-byte link address
pub const PORT_EXTENDED_LINK: u8 = 0x10;

/// Backplane port on a ControlLogix/CompactLogix chassis
pub const PORT_BACKPLANE: u16 = 1;

/// One element of a CIP path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Route out of `port` to the node at `link` (a slot number, or an
    /// address string such as `10.0.0.5` for Ethernet ports)
    Port { port: u16, link: Vec<u8> },
    Class(u32),
    Instance(u32),
    Attribute(u32),
    /// ANSI symbolic segment; not encodable by this engine
    Symbolic(String),
}

impl PathSegment {
    /// Append the encoded segment to `out`
    ///
    /// # Errors
    /// `EipError::UnsupportedSegment` for 16/32-bit logical values, port
    /// numbers that need the extended port form, empty links and symbolic
    /// segments.
    pub fn encode_into(&self, out: &mut Vec<u8>) -> EipResult<()> {
        match self {
            PathSegment::Class(id) => encode_logical(out, SEGMENT_CLASS_8BIT, "class", *id),
            PathSegment::Instance(id) => {
                encode_logical(out, SEGMENT_INSTANCE_8BIT, "instance", *id)
            }
            PathSegment::Attribute(id) => {
                encode_logical(out, SEGMENT_ATTRIBUTE_8BIT, "attribute", *id)
            }
            PathSegment::Port { port, link } => {
                if *port == 0 || *port >= 0x0F {
                    return Err(EipError::UnsupportedSegment(format!(
                        "port number {} needs an extended port segment",
                        port
                    )));
                }
                match link.len() {
                    0 => Err(EipError::UnsupportedSegment(
                        "port segment without link address".to_string(),
                    )),
                    1 => {
                        out.push(*port as u8);
                        out.push(link[0]);
                        Ok(())
                    }
                    n if n <= u8::MAX as usize => {
                        out.push(PORT_EXTENDED_LINK | *port as u8);
                        out.push(n as u8);
                        out.extend_from_slice(link);
                        // the link address is padded inside the segment
                        if n % 2 != 0 {
                            out.push(0);
                        }
                        Ok(())
                    }
                    n => Err(EipError::UnsupportedSegment(format!(
                        "link address of {} bytes",
                        n
                    ))),
                }
            }
            PathSegment::Symbolic(name) => Err(EipError::UnsupportedSegment(format!(
                "symbolic segment '{}'",
                name
            ))),
        }
    }
}

fn encode_logical(out: &mut Vec<u8>, kind: u8, what: &str, id: u32) -> EipResult<()> {
    if id > u8::MAX as u32 {
        return Err(EipError::UnsupportedSegment(format!(
            "{} 0x{:X} needs a 16/32-bit logical segment",
            what, id
        )));
    }
    out.push(kind);
    out.push(id as u8);
    Ok(())
}

/// An ordered CIP path, built fluently
///
/// # Example
/// ```
/// use eip_cip::path::CipPath;
///
/// let bytes = CipPath::new().class(0x06).instance(0x01).encode().unwrap();
/// assert_eq!(bytes, vec![0x02, 0x20, 0x06, 0x24, 0x01]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CipPath {
    segments: Vec<PathSegment>,
}

impl CipPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path to the Connection Manager object (class 0x06, instance 0x01)
    pub fn connection_manager() -> Self {
        Self::new().class(0x06).instance(0x01)
    }

    /// Path to the Message Router object (class 0x02, instance 0x01)
    pub fn message_router() -> Self {
        Self::new().class(0x02).instance(0x01)
    }

    /// Route to the processor in `slot` of the local backplane
    pub fn backplane_slot(slot: u8) -> Self {
        Self::new().port(PORT_BACKPLANE, vec![slot])
    }

    pub fn port(mut self, port: u16, link: Vec<u8>) -> Self {
        self.segments.push(PathSegment::Port { port, link });
        self
    }

    pub fn class(mut self, class: u32) -> Self {
        self.segments.push(PathSegment::Class(class));
        self
    }

    pub fn instance(mut self, instance: u32) -> Self {
        self.segments.push(PathSegment::Instance(instance));
        self
    }

    pub fn attribute(mut self, attribute: u32) -> Self {
        self.segments.push(PathSegment::Attribute(attribute));
        self
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }

    /// Append all segments of `other`
    pub fn join(mut self, other: &CipPath) -> Self {
        self.segments.extend(other.segments.iter().cloned());
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Encode the segments only, padded to an even byte count
    pub fn encode_segments(&self) -> EipResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.segments.len() * 2);
        for segment in &self.segments {
            segment.encode_into(&mut out)?;
        }
        if out.len() % 2 != 0 {
            out.push(0);
        }
        Ok(out)
    }

    /// Encode as `[size in words, segment bytes...]`
    pub fn encode(&self) -> EipResult<Vec<u8>> {
        let segments = self.encode_segments()?;
        let words = segments.len() / 2;
        if words > u8::MAX as usize {
            return Err(EipError::InvalidData(format!(
                "CIP path of {} words does not fit a one-byte size",
                words
            )));
        }
        let mut out = Vec::with_capacity(segments.len() + 1);
        out.push(words as u8);
        out.extend_from_slice(&segments);
        Ok(out)
    }

    /// Parse a route such as `"1,0"` or `"1,0,2,10.0.0.5"` into port segments
    ///
    /// Elements come in `port,link` pairs. A link that is not a plain number is
    /// taken as an address string and encoded as an extended link address.
    pub fn parse_route(route: &str) -> EipResult<Self> {
        let route = route.trim();
        if route.is_empty() {
            return Ok(Self::new());
        }
        let parts: Vec<&str> = route.split(',').map(str::trim).collect();
        if parts.len() % 2 != 0 {
            return Err(EipError::InvalidData(format!(
                "route '{}' must consist of port,link pairs",
                route
            )));
        }

        let mut path = Self::new();
        for pair in parts.chunks(2) {
            let port: u16 = pair[0].parse().map_err(|_| {
                EipError::InvalidData(format!("invalid port '{}' in route '{}'", pair[0], route))
            })?;
            let link = match pair[1].parse::<u8>() {
                Ok(slot) => vec![slot],
                Err(_) if !pair[1].is_empty() => pair[1].as_bytes().to_vec(),
                Err(_) => {
                    return Err(EipError::InvalidData(format!(
                        "empty link address in route '{}'",
                        route
                    )));
                }
            };
            path = path.port(port, link);
        }
        Ok(path)
    }
}
