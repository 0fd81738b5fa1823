//! The DNS message model: just enough of RFC 1035 for an iterative
//! resolver speaking A, AAAA, CNAME, MX, and NS, plus the EDNS0 OPT
//! pseudo-record of RFC 6891.  Anything else on the wire survives a
//! parse as an `Unknown` record but is never interpreted.

use bytes::Bytes;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Maximum encoded length of a domain name: the label length octets
/// plus the sum of the label lengths.
pub const DOMAINNAME_MAX_LEN: usize = 255;

/// Maximum length of a single label in a domain name.
pub const LABEL_MAX_LEN: usize = 63;

/// Octet mask for the QR flag being set (response).
pub const HEADER_MASK_QR: u8 = 0b1000_0000;

/// Octet mask for the opcode field.
pub const HEADER_MASK_OPCODE: u8 = 0b0111_1000;

/// Offset for the opcode field.
pub const HEADER_OFFSET_OPCODE: usize = 3;

/// Octet mask for the AA flag being set (authoritative).
pub const HEADER_MASK_AA: u8 = 0b0000_0100;

/// Octet mask for the TC flag being set (truncated).
pub const HEADER_MASK_TC: u8 = 0b0000_0010;

/// Octet mask for the RD flag being set (recursion desired).
pub const HEADER_MASK_RD: u8 = 0b0000_0001;

/// Octet mask for the RA flag being set (recursion available).
pub const HEADER_MASK_RA: u8 = 0b1000_0000;

/// Octet mask for the rcode field.
pub const HEADER_MASK_RCODE: u8 = 0b0000_1111;

/// A DNS message, used for both queries and responses: a header
/// followed by the question, answer, authority, and additional
/// sections.  See section 4.1 of RFC 1035.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authority: Vec<ResourceRecord>,
    pub additional: Vec<ResourceRecord>,
}

impl Message {
    /// An iterative query: RD is left clear, the upstream nameserver is
    /// expected to answer from its own data or refer us onwards.
    pub fn from_question(id: u16, question: Question) -> Self {
        Self {
            header: Header {
                id,
                is_response: false,
                opcode: Opcode::Standard,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: false,
                recursion_available: false,
                rcode: Rcode::NoError,
            },
            questions: vec![question],
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Like `from_question`, with an EDNS0 OPT pseudo-record in the
    /// additional section advertising the given UDP payload size.
    ///
    /// The OPT record abuses the class field for the payload size and
    /// the TTL field for extended flags (all zero here), per RFC 6891.
    pub fn from_question_with_edns(id: u16, question: Question, payload_size: u16) -> Self {
        let mut message = Self::from_question(id, question);
        message.additional.push(ResourceRecord {
            name: DomainName::root(),
            rdata: RecordData::OPT { octets: Bytes::new() },
            rclass: RecordClass::from(payload_size),
            ttl: 0,
        });
        message
    }

    /// An empty response to this message, with the id, opcode, and
    /// questions carried over.
    pub fn make_response(&self) -> Self {
        Self {
            header: Header {
                id: self.header.id,
                is_response: true,
                opcode: self.header.opcode,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: self.header.recursion_desired,
                recursion_available: true,
                rcode: Rcode::NoError,
            },
            questions: self.questions.clone(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// A bare FORMERR response for a message which could not be parsed
    /// beyond its id.
    pub fn make_format_error_response(id: u16) -> Self {
        Self {
            header: Header {
                id,
                is_response: true,
                opcode: Opcode::Standard,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: false,
                recursion_available: true,
                rcode: Rcode::FormatError,
            },
            questions: Vec::new(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }
}

/// The fixed 12-octet message header.  The four section counts are
/// omitted: they only exist during serialisation and deserialisation
/// and can be recovered from the `Message` vectors.
///
/// See section 4.1.1 of RFC 1035.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Header {
    /// Identifier assigned by the originator of a query, copied into
    /// the reply so responses can be matched to outstanding queries.
    pub id: u16,

    /// Whether this message is a query (false) or a response (true).
    pub is_response: bool,

    /// The kind of query.
    pub opcode: Opcode,

    /// Whether the responding nameserver is an authority for the
    /// question name.
    pub is_authoritative: bool,

    /// Whether the message was truncated to fit the transport.
    pub is_truncated: bool,

    /// Set in a query to request recursive service, copied into the
    /// response.
    pub recursion_desired: bool,

    /// Set in a response to indicate recursive service is available.
    pub recursion_available: bool,

    /// The response code.
    pub rcode: Rcode,
}

/// A single entry of the question section.
///
/// See section 4.1.2 of RFC 1035.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Question {
    pub name: DomainName,
    pub qtype: RecordType,
    pub qclass: RecordClass,
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.qclass, self.qtype)
    }
}

/// A single resource record, as found in the answer, authority, and
/// additional sections.
///
/// See section 4.1.3 of RFC 1035.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ResourceRecord {
    /// The domain name this record pertains to.
    pub name: DomainName,

    /// The record type together with its deserialised data.
    pub rdata: RecordData,

    /// The class of the record.  For the OPT pseudo-record this field
    /// carries the requested UDP payload size instead.
    pub rclass: RecordClass,

    /// How long, in seconds, the record may be cached.  Zero means the
    /// record is only valid for the transaction in progress.
    pub ttl: u32,
}

impl ResourceRecord {
    pub fn rtype(&self) -> RecordType {
        self.rdata.rtype()
    }
}

/// A record type with its associated, deserialised, data.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum RecordData {
    /// A 32-bit Internet address.
    A { address: Ipv4Addr },

    /// A 128-bit Internet address.
    AAAA { address: Ipv6Addr },

    /// The canonical name for an alias.
    CNAME { cname: DomainName },

    /// A host which should be authoritative for the owner domain.
    NS { nsdname: DomainName },

    /// A mail exchange for the owner domain, with its preference
    /// (lower values preferred).
    MX {
        preference: u16,
        exchange: DomainName,
    },

    /// The EDNS0 pseudo-record.  The interesting payload-size field
    /// lives in the record's class; the rdata octets (EDNS options)
    /// are kept but not interpreted.
    OPT { octets: Bytes },

    /// Any record type this resolver does not interpret.  The rdata is
    /// kept verbatim; note that compression pointers inside it are not
    /// expanded, so it is only safe to ignore.
    Unknown {
        tag: RecordTypeUnknown,
        octets: Bytes,
    },
}

impl RecordData {
    pub fn rtype(&self) -> RecordType {
        match self {
            RecordData::A { .. } => RecordType::A,
            RecordData::AAAA { .. } => RecordType::AAAA,
            RecordData::CNAME { .. } => RecordType::CNAME,
            RecordData::NS { .. } => RecordType::NS,
            RecordData::MX { .. } => RecordType::MX,
            RecordData::OPT { .. } => RecordType::OPT,
            RecordData::Unknown { tag, .. } => RecordType::Unknown(*tag),
        }
    }
}

/// What sort of query this is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Opcode {
    Standard,
    Inverse,
    Status,
    Reserved(OpcodeReserved),
}

/// A struct with a private constructor, to ensure invalid `Opcode`s
/// cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct OpcodeReserved(u8);

impl From<u8> for Opcode {
    fn from(octet: u8) -> Self {
        match octet & 0b0000_1111 {
            0 => Opcode::Standard,
            1 => Opcode::Inverse,
            2 => Opcode::Status,
            other => Opcode::Reserved(OpcodeReserved(other)),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        match value {
            Opcode::Standard => 0,
            Opcode::Inverse => 1,
            Opcode::Status => 2,
            Opcode::Reserved(OpcodeReserved(octet)) => octet,
        }
    }
}

/// What sort of response this is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Rcode {
    NoError,
    FormatError,
    ServerFailure,
    NameError,
    NotImplemented,
    Refused,
    Reserved(RcodeReserved),
}

/// A struct with a private constructor, to ensure invalid `Rcode`s
/// cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RcodeReserved(u8);

impl fmt::Display for Rcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Rcode::NoError => write!(f, "no-error"),
            Rcode::FormatError => write!(f, "format-error"),
            Rcode::ServerFailure => write!(f, "server-failure"),
            Rcode::NameError => write!(f, "name-error"),
            Rcode::NotImplemented => write!(f, "not-implemented"),
            Rcode::Refused => write!(f, "refused"),
            Rcode::Reserved(_) => write!(f, "reserved"),
        }
    }
}

impl From<u8> for Rcode {
    fn from(octet: u8) -> Self {
        match octet & 0b0000_1111 {
            0 => Rcode::NoError,
            1 => Rcode::FormatError,
            2 => Rcode::ServerFailure,
            3 => Rcode::NameError,
            4 => Rcode::NotImplemented,
            5 => Rcode::Refused,
            other => Rcode::Reserved(RcodeReserved(other)),
        }
    }
}

impl From<Rcode> for u8 {
    fn from(value: Rcode) -> Self {
        match value {
            Rcode::NoError => 0,
            Rcode::FormatError => 1,
            Rcode::ServerFailure => 2,
            Rcode::NameError => 3,
            Rcode::NotImplemented => 4,
            Rcode::Refused => 5,
            Rcode::Reserved(RcodeReserved(octet)) => octet,
        }
    }
}

/// A domain name: a sequence of labels ending with the empty root
/// label.  Labels are lowercased on construction, so two names compare
/// equal exactly when they match case-insensitively, and every name is
/// already in the canonical form used for cache keys.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DomainName {
    pub labels: Vec<Label>,
    /// The wire encoding of the name: each label preceded by its
    /// length octet, terminated by the zero octet of the root label.
    ///
    /// INVARIANT: `octets` is exactly the encoding of `labels`.
    pub octets: Vec<u8>,
}

impl DomainName {
    pub fn root() -> Self {
        DomainName {
            labels: vec![Label::new()],
            octets: vec![0],
        }
    }

    pub fn is_root(&self) -> bool {
        self.labels.len() == 1 && self.labels[0].is_empty()
    }

    pub fn is_subdomain_of(&self, other: &DomainName) -> bool {
        self.labels.ends_with(&other.labels)
    }

    pub fn to_dotted_string(&self) -> String {
        if self.is_root() {
            return ".".to_string();
        }

        let mut out = String::with_capacity(self.octets.len());
        for label in &self.labels {
            for octet in label.octets() {
                out.push(*octet as char);
            }
            if !label.is_empty() {
                out.push('.');
            }
        }
        out
    }

    /// Parse a dotted string into a name.  The trailing dot is
    /// required for non-root names ("example.com." not "example.com"):
    /// relative names have no meaning to this resolver.
    pub fn from_dotted_string(s: &str) -> Option<Self> {
        if s == "." {
            return Some(Self::root());
        }
        if !s.ends_with('.') {
            return None;
        }

        let chunks: Vec<&str> = s.split('.').collect();
        let mut labels = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            if chunk.is_empty() && i != chunks.len() - 1 {
                return None;
            }
            match Label::try_from(chunk.as_bytes()) {
                Ok(label) => labels.push(label),
                Err(_) => return None,
            }
        }

        Self::from_labels(labels)
    }

    /// Build a name from labels, which must be non-empty and end with
    /// the root label.
    pub fn from_labels(labels: Vec<Label>) -> Option<Self> {
        if labels.is_empty() {
            return None;
        }

        let mut octets = Vec::with_capacity(DOMAINNAME_MAX_LEN);
        let mut saw_root = false;
        for label in &labels {
            if saw_root {
                return None;
            }
            saw_root = label.is_empty();
            octets.push(label.len());
            octets.extend_from_slice(label.octets());
        }

        if saw_root && octets.len() <= DOMAINNAME_MAX_LEN {
            Some(Self { labels, octets })
        } else {
            None
        }
    }
}

impl fmt::Debug for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainName")
            .field("to_dotted_string()", &self.to_dotted_string())
            .finish()
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_dotted_string())
    }
}

impl FromStr for DomainName {
    type Err = DomainNameFromStr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DomainName::from_dotted_string(s).ok_or(DomainNameFromStr::NoParse)
    }
}

/// Errors that can arise when converting a `&str` into a `DomainName`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DomainNameFromStr {
    NoParse,
}

impl fmt::Display for DomainNameFromStr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "could not parse string to domain name")
    }
}

impl std::error::Error for DomainNameFromStr {}

/// A label: up to 63 octets, compared as case-insensitive ASCII (and
/// stored lowercased to make that free).
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Label {
    /// Private to this module so constructing an over-long `Label` is
    /// impossible.
    octets: Bytes,
}

impl Label {
    /// The empty root label.
    pub fn new() -> Self {
        Self {
            octets: Bytes::new(),
        }
    }

    #[allow(clippy::missing_panics_doc)]
    pub fn len(&self) -> u8 {
        // safe as `TryFrom` ensures a label is <= 63 octets
        self.octets.len().try_into().unwrap()
    }

    pub fn is_empty(&self) -> bool {
        self.octets.is_empty()
    }

    pub fn octets(&self) -> &Bytes {
        &self.octets
    }
}

impl Default for Label {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<&[u8]> for Label {
    type Error = LabelTryFromOctetsError;

    fn try_from(mixed_case_octets: &[u8]) -> Result<Self, Self::Error> {
        if mixed_case_octets.len() > LABEL_MAX_LEN {
            return Err(LabelTryFromOctetsError::TooLong);
        }

        Ok(Self {
            octets: Bytes::from(mixed_case_octets.to_ascii_lowercase()),
        })
    }
}

/// Errors that can arise when converting a `[u8]` into a `Label`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum LabelTryFromOctetsError {
    TooLong,
}

/// The record types this resolver knows.  `OPT` only ever appears in
/// the additional section; `Unknown` covers everything else on the
/// wire.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RecordType {
    A,
    NS,
    CNAME,
    MX,
    AAAA,
    OPT,
    Unknown(RecordTypeUnknown),
}

/// A struct with a private constructor, to ensure invalid
/// `RecordType`s cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RecordTypeUnknown(u16);

impl RecordType {
    /// Whether this is one of the types the resolver will answer
    /// questions for.
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            RecordType::A | RecordType::NS | RecordType::CNAME | RecordType::MX | RecordType::AAAA
        )
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::NS => write!(f, "NS"),
            RecordType::CNAME => write!(f, "CNAME"),
            RecordType::MX => write!(f, "MX"),
            RecordType::AAAA => write!(f, "AAAA"),
            RecordType::OPT => write!(f, "OPT"),
            RecordType::Unknown(RecordTypeUnknown(n)) => write!(f, "TYPE{n}"),
        }
    }
}

impl FromStr for RecordType {
    type Err = RecordTypeFromStr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(RecordType::A),
            "NS" => Ok(RecordType::NS),
            "CNAME" => Ok(RecordType::CNAME),
            "MX" => Ok(RecordType::MX),
            "AAAA" => Ok(RecordType::AAAA),
            _ => Err(RecordTypeFromStr::Unsupported),
        }
    }
}

/// Errors that can arise when converting a `&str` into a `RecordType`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RecordTypeFromStr {
    Unsupported,
}

impl fmt::Display for RecordTypeFromStr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "not a supported record type")
    }
}

impl std::error::Error for RecordTypeFromStr {}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            2 => RecordType::NS,
            5 => RecordType::CNAME,
            15 => RecordType::MX,
            28 => RecordType::AAAA,
            41 => RecordType::OPT,
            _ => RecordType::Unknown(RecordTypeUnknown(value)),
        }
    }
}

impl From<RecordType> for u16 {
    fn from(value: RecordType) -> Self {
        match value {
            RecordType::A => 1,
            RecordType::NS => 2,
            RecordType::CNAME => 5,
            RecordType::MX => 15,
            RecordType::AAAA => 28,
            RecordType::OPT => 41,
            RecordType::Unknown(RecordTypeUnknown(value)) => value,
        }
    }
}

/// Record classes.  Only IN is interpreted; the OPT pseudo-record
/// smuggles its payload size through this field as an `Unknown`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RecordClass {
    IN,
    Unknown(RecordClassUnknown),
}

/// A struct with a private constructor, to ensure invalid
/// `RecordClass`es cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RecordClassUnknown(u16);

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordClass::IN => write!(f, "IN"),
            RecordClass::Unknown(RecordClassUnknown(n)) => write!(f, "CLASS{n}"),
        }
    }
}

impl From<u16> for RecordClass {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordClass::IN,
            _ => RecordClass::Unknown(RecordClassUnknown(value)),
        }
    }
}

impl From<RecordClass> for u16 {
    fn from(value: RecordClass) -> Self {
        match value {
            RecordClass::IN => 1,
            RecordClass::Unknown(RecordClassUnknown(value)) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u8_opcode_roundtrip() {
        for i in 0..15 {
            assert_eq!(u8::from(Opcode::from(i)), i);
        }
    }

    #[test]
    fn u8_rcode_roundtrip() {
        for i in 0..15 {
            assert_eq!(u8::from(Rcode::from(i)), i);
        }
    }

    #[test]
    fn u16_recordtype_roundtrip() {
        for i in 0..100 {
            assert_eq!(u16::from(RecordType::from(i)), i);
        }
    }

    #[test]
    fn u16_recordclass_roundtrip() {
        for i in 0..100 {
            assert_eq!(u16::from(RecordClass::from(i)), i);
        }
    }

    #[test]
    fn domainname_root_conversions() {
        assert_eq!(Some(DomainName::root()), DomainName::from_dotted_string("."));
        assert_eq!(
            Some(DomainName::root()),
            DomainName::from_labels(vec![Label::new()])
        );
        assert_eq!(".", DomainName::root().to_dotted_string());
    }

    #[test]
    fn domainname_lowercases() {
        assert_eq!(
            DomainName::from_dotted_string("WWW.Example.COM."),
            DomainName::from_dotted_string("www.example.com.")
        );
    }

    #[test]
    fn domainname_requires_trailing_dot() {
        assert_eq!(None, DomainName::from_dotted_string("example.com"));
    }

    #[test]
    fn domainname_rejects_empty_interior_label() {
        assert_eq!(None, DomainName::from_dotted_string("example..com."));
    }

    #[test]
    fn domainname_dotted_string_roundtrip() {
        for name in ["example.com.", "a.b.c.d.example.", "x."] {
            assert_eq!(
                Some(name.to_string()),
                DomainName::from_dotted_string(name).map(|d| d.to_dotted_string())
            );
        }
    }

    #[test]
    fn subdomain_of_ancestors() {
        let sub = DomainName::from_dotted_string("www.example.com.").unwrap();
        let apex = DomainName::from_dotted_string("example.com.").unwrap();
        let other = DomainName::from_dotted_string("example.net.").unwrap();

        assert!(sub.is_subdomain_of(&apex));
        assert!(sub.is_subdomain_of(&DomainName::root()));
        assert!(!sub.is_subdomain_of(&other));
    }

    #[test]
    fn edns_query_has_opt_in_additional() {
        let question = Question {
            name: DomainName::from_dotted_string("example.com.").unwrap(),
            qtype: RecordType::A,
            qclass: RecordClass::IN,
        };
        let message = Message::from_question_with_edns(1234, question, 4096);

        assert!(!message.header.recursion_desired);
        assert_eq!(1, message.additional.len());

        let opt = &message.additional[0];
        assert!(opt.name.is_root());
        assert_eq!(RecordType::OPT, opt.rtype());
        assert_eq!(4096, u16::from(opt.rclass));
        assert_eq!(0, opt.ttl);
    }
}

#[cfg(any(feature = "test-util", test))]
#[allow(clippy::missing_panics_doc)]
pub mod test_util {
    use super::*;

    pub fn domain(name: &str) -> DomainName {
        DomainName::from_dotted_string(name).unwrap()
    }

    pub fn a_record(name: &str, address: Ipv4Addr) -> ResourceRecord {
        ResourceRecord {
            name: domain(name),
            rdata: RecordData::A { address },
            rclass: RecordClass::IN,
            ttl: 300,
        }
    }

    pub fn aaaa_record(name: &str, address: Ipv6Addr) -> ResourceRecord {
        ResourceRecord {
            name: domain(name),
            rdata: RecordData::AAAA { address },
            rclass: RecordClass::IN,
            ttl: 300,
        }
    }

    pub fn cname_record(name: &str, target_name: &str) -> ResourceRecord {
        ResourceRecord {
            name: domain(name),
            rdata: RecordData::CNAME {
                cname: domain(target_name),
            },
            rclass: RecordClass::IN,
            ttl: 300,
        }
    }

    pub fn ns_record(superdomain_name: &str, nameserver_name: &str) -> ResourceRecord {
        ResourceRecord {
            name: domain(superdomain_name),
            rdata: RecordData::NS {
                nsdname: domain(nameserver_name),
            },
            rclass: RecordClass::IN,
            ttl: 300,
        }
    }

    pub fn mx_record(name: &str, preference: u16, exchange_name: &str) -> ResourceRecord {
        ResourceRecord {
            name: domain(name),
            rdata: RecordData::MX {
                preference,
                exchange: domain(exchange_name),
            },
            rclass: RecordClass::IN,
            ttl: 300,
        }
    }
}
