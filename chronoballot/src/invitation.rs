use crate::*;
use std::fmt;
use std::str::FromStr;

const INVITATION_VERSION: u32 = 0x1b68c700;

/// Human-copyable pointer to an election: the network kind, the backend
/// address on that network, and the bootstrap server list. Earlier layouts
/// without the network field are rejected as unknown versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    pub network: String,
    pub address: Vec<u8>,
    pub servers: Vec<String>,
}

impl Invitation {
    pub fn encode(&self) -> String {
        assert!(self.servers.len() <= 255, "too many servers in invitation");
        let mut w = BufferWriter::new();
        w.write_uint32(INVITATION_VERSION);
        w.write_vector(self.network.as_bytes());
        w.write_vector(&self.address);
        w.write_byte(self.servers.len() as u8);
        for s in &self.servers {
            w.write_vector(s.as_bytes());
        }
        base32c::check_encode(&w.into_bytes())
    }

    pub fn decode(s: &str) -> Result<Self> {
        let p = base32c::check_decode(s)?;
        let mut r = BufferReader::new(&p);
        if r.read_uint32()? != INVITATION_VERSION {
            return Err(Error::UnknownVersion);
        }
        let network = String::from_utf8_lossy(r.read_vector()?).into_owned();
        let address = r.read_vector()?.to_vec();
        let num_servers = r.read_byte()?;
        let mut servers = Vec::with_capacity(num_servers as usize);
        for _ in 0..num_servers {
            servers.push(String::from_utf8_lossy(r.read_vector()?).into_owned());
        }
        Ok(Invitation {
            network,
            address,
            servers,
        })
    }
}

impl fmt::Display for Invitation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl FromStr for Invitation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Invitation::decode(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let inv = Invitation {
            network: "http".to_string(),
            address: b"backend-17".to_vec(),
            servers: vec![
                "https://log.example.org".to_string(),
                "https://mirror.example.org".to_string(),
            ],
        };
        let s = inv.to_string();
        assert_eq!(Invitation::from_str(&s).unwrap(), inv);
    }

    #[test]
    fn round_trip_without_servers() {
        let inv = Invitation {
            network: "http".to_string(),
            address: vec![1, 2, 3],
            servers: vec![],
        };
        assert_eq!(Invitation::decode(&inv.encode()).unwrap(), inv);
    }

    #[test]
    fn rejects_wrong_magic() {
        // A network-less legacy layout would start with a different magic.
        let mut w = BufferWriter::new();
        w.write_uint32(0x1b68c600);
        w.write_vector(b"addr");
        w.write_byte(0);
        let s = base32c::check_encode(&w.into_bytes());
        assert!(matches!(
            Invitation::decode(&s),
            Err(Error::UnknownVersion)
        ));
    }

    #[test]
    fn rejects_corrupted_string() {
        let inv = Invitation {
            network: "http".to_string(),
            address: vec![9; 8],
            servers: vec!["s".to_string()],
        };
        let mut s = inv.encode();
        s.push('0');
        assert!(Invitation::decode(&s).is_err());
    }
}
