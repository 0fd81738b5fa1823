//! Serialisation of DNS messages to the wire format.  See the `types`
//! module for details of the format.
//!
//! Names are written uncompressed: this resolver's questions are tiny
//! and its listener responses comfortably fit the transport without
//! pointer compression.

use crate::types::*;

impl Message {
    /// # Errors
    ///
    /// If the message is invalid (the `Message` type permits more
    /// states than the wire format does).
    pub fn into_octets(self) -> Result<Vec<u8>, Error> {
        let mut buffer = WritableBuffer::default();
        self.serialise(&mut buffer)?;
        Ok(buffer.octets)
    }

    fn serialise(self, buffer: &mut WritableBuffer) -> Result<(), Error> {
        let qdcount = usize_to_u16(self.questions.len())?;
        let ancount = usize_to_u16(self.answers.len())?;
        let nscount = usize_to_u16(self.authority.len())?;
        let arcount = usize_to_u16(self.additional.len())?;

        self.header.serialise(buffer);
        buffer.write_u16(qdcount);
        buffer.write_u16(ancount);
        buffer.write_u16(nscount);
        buffer.write_u16(arcount);

        for question in self.questions {
            question.serialise(buffer);
        }
        for rr in self.answers {
            rr.serialise(buffer)?;
        }
        for rr in self.authority {
            rr.serialise(buffer)?;
        }
        for rr in self.additional {
            rr.serialise(buffer)?;
        }

        Ok(())
    }
}

impl Header {
    fn serialise(self, buffer: &mut WritableBuffer) {
        // octet 1
        let flag_qr = if self.is_response { HEADER_MASK_QR } else { 0 };
        let field_opcode = HEADER_MASK_OPCODE & (u8::from(self.opcode) << HEADER_OFFSET_OPCODE);
        let flag_aa = if self.is_authoritative {
            HEADER_MASK_AA
        } else {
            0
        };
        let flag_tc = if self.is_truncated { HEADER_MASK_TC } else { 0 };
        let flag_rd = if self.recursion_desired {
            HEADER_MASK_RD
        } else {
            0
        };
        // octet 2
        let flag_ra = if self.recursion_available {
            HEADER_MASK_RA
        } else {
            0
        };
        let field_rcode = HEADER_MASK_RCODE & u8::from(self.rcode);

        buffer.write_u16(self.id);
        buffer.write_u8(flag_qr | field_opcode | flag_aa | flag_tc | flag_rd);
        buffer.write_u8(flag_ra | field_rcode);
    }
}

impl Question {
    fn serialise(self, buffer: &mut WritableBuffer) {
        buffer.write_octets(&self.name.octets);
        buffer.write_u16(self.qtype.into());
        buffer.write_u16(self.qclass.into());
    }
}

impl ResourceRecord {
    /// # Errors
    ///
    /// If the RDATA is too long.
    pub fn serialise(self, buffer: &mut WritableBuffer) -> Result<(), Error> {
        buffer.write_octets(&self.name.octets);
        buffer.write_u16(self.rdata.rtype().into());
        buffer.write_u16(self.rclass.into());
        buffer.write_u32(self.ttl);

        // filled in below, once the rdata length is known
        let rdlength_index = buffer.index();
        buffer.write_u16(0);

        match self.rdata {
            RecordData::A { address } => buffer.write_octets(&address.octets()),
            RecordData::AAAA { address } => buffer.write_octets(&address.octets()),
            RecordData::CNAME { cname } => buffer.write_octets(&cname.octets),
            RecordData::NS { nsdname } => buffer.write_octets(&nsdname.octets),
            RecordData::MX {
                preference,
                exchange,
            } => {
                buffer.write_u16(preference);
                buffer.write_octets(&exchange.octets);
            }
            RecordData::OPT { octets } | RecordData::Unknown { octets, .. } => {
                buffer.write_octets(&octets);
            }
        }

        // -2 so we don't also include the 2 octets of the rdlength
        // field itself
        let rdlength = usize_to_u16(buffer.index() - rdlength_index - 2)?;
        let [hi, lo] = rdlength.to_be_bytes();
        buffer.octets[rdlength_index] = hi;
        buffer.octets[rdlength_index + 1] = lo;

        Ok(())
    }
}

/// Errors encountered when serialising a message.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Error {
    /// A counter does not fit in the desired width.
    CounterTooLarge { counter: usize, bits: u32 },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::CounterTooLarge { counter, bits } => {
                write!(f, "'{counter}' cannot be converted to a u{bits}")
            }
        }
    }
}

impl std::error::Error for Error {}

/// A buffer which can be written to, for serialisation purposes.
pub struct WritableBuffer {
    pub octets: Vec<u8>,
}

impl Default for WritableBuffer {
    fn default() -> Self {
        Self {
            octets: Vec::with_capacity(512),
        }
    }
}

impl WritableBuffer {
    fn index(&self) -> usize {
        self.octets.len()
    }

    fn write_u8(&mut self, octet: u8) {
        self.octets.push(octet);
    }

    fn write_u16(&mut self, value: u16) {
        self.octets.extend_from_slice(&value.to_be_bytes());
    }

    fn write_u32(&mut self, value: u32) {
        self.octets.extend_from_slice(&value.to_be_bytes());
    }

    fn write_octets(&mut self, octets: &[u8]) {
        self.octets.extend_from_slice(octets);
    }
}

/// Helper function to convert a `usize` into a `u16` (or return an
/// error).
fn usize_to_u16(counter: usize) -> Result<u16, Error> {
    u16::try_from(counter).map_err(|_| Error::CounterTooLarge {
        counter,
        bits: u16::BITS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_util::*;

    #[test]
    #[rustfmt::skip]
    fn serialise_sets_rdlength() {
        let mut buffer = WritableBuffer::default();
        let rr = mx_record("www.example.com.", 32, "mx.example.com.");
        rr.serialise(&mut buffer).unwrap();

        assert_eq!(
            vec![
                // NAME
                3, 119, 119, 119, // "www"
                7, 101, 120, 97, 109, 112, 108, 101, // "example"
                3, 99, 111, 109, 0, // "com"
                // TYPE
                0, 15, // MX
                // CLASS
                0, 1, // IN
                // TTL
                0, 0, 0b0000_0001, 0b0010_1100, // 300
                // RDLENGTH
                0, 18,
                // RDATA
                0, 32, // preference
                2, 109, 120, // "mx"
                7, 101, 120, 97, 109, 112, 108, 101, // "example"
                3, 99, 111, 109, 0, // "com"
            ],
            buffer.octets,
        );
    }

    #[test]
    #[rustfmt::skip]
    fn serialise_query_with_edns() {
        let question = Question {
            name: domain("example.com."),
            qtype: RecordType::A,
            qclass: RecordClass::IN,
        };
        let octets = Message::from_question_with_edns(0x1234, question, 4096)
            .into_octets()
            .unwrap();

        assert_eq!(
            vec![
                0x12, 0x34, // ID
                0, 0, // flags: query, standard, RD clear
                0, 1, // QDCOUNT
                0, 0, // ANCOUNT
                0, 0, // NSCOUNT
                0, 1, // ARCOUNT
                // question
                7, 101, 120, 97, 109, 112, 108, 101, // "example"
                3, 99, 111, 109, 0, // "com"
                0, 1, // QTYPE A
                0, 1, // QCLASS IN
                // OPT pseudo-record
                0, // root name
                0, 41, // TYPE OPT
                16, 0, // CLASS = 4096 payload size
                0, 0, 0, 0, // TTL = extended flags, all clear
                0, 0, // RDLENGTH
            ],
            octets,
        );
    }
}
