use crate::*;
use num_enum::TryFromPrimitive;
use std::time::{SystemTime, UNIX_EPOCH};

const PARAMS_VERSION: u32 = 0;

/// Phases of an election, linearly ordered. Setup is a pre-publication state
/// a client only observes while the parameters are not yet distributed; the
/// phase function over published parameters starts at CredGen.
#[derive(
    TryFromPrimitive, Serialize, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord,
)]
#[repr(u8)]
#[serde(rename_all = "snake_case")]
pub enum ElectionPhase {
    Setup = 0,
    CredGen = 1,
    Cast = 2,
    Tally = 3,
    End = 4,
}

/// Versioned election parameters: timing, voting method, choices, roster and
/// the VDF difficulty bound. The serialized form is what the broadcast
/// channel distributes and what the election identifier commits to.
#[derive(Debug, Clone, PartialEq)]
pub struct ElectionParams {
    pub version: u32,
    pub cast_start: u64,
    pub tally_start: u64,
    pub tally_end: u64,
    pub max_vdf_difficulty: u64,
    pub voting_method: String,
    pub title: String,
    pub description: String,
    pub choices: Vec<String>,
    pub eligibility_list: EligibilityList,
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl ElectionParams {
    /// Current phase against the wall clock.
    pub fn phase(&self) -> ElectionPhase {
        self.phase_at(unix_now())
    }

    pub fn phase_at(&self, now: u64) -> ElectionPhase {
        if now < self.cast_start {
            ElectionPhase::CredGen
        } else if now < self.tally_start {
            ElectionPhase::Cast
        } else if now < self.tally_end {
            ElectionPhase::Tally
        } else {
            ElectionPhase::End
        }
    }

    /// Structural invariants: phase timestamps strictly ordered, a known
    /// voting method, a non-empty choice list that fits the one-byte count.
    pub fn validate(&self) -> Result<()> {
        if !(self.cast_start < self.tally_start && self.tally_start < self.tally_end) {
            return Err(Error::InvalidParams("phase timestamps out of order"));
        }
        if self.choices.is_empty() || self.choices.len() > 255 {
            return Err(Error::InvalidParams("choice count out of range"));
        }
        methods::get(&self.voting_method, &self.choices)?;
        Ok(())
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut w = BufferWriter::new();
        w.write_uint32(self.version);
        w.write_uint64(self.cast_start);
        w.write_uint64(self.tally_start);
        w.write_uint64(self.tally_end);
        w.write_uint64(self.max_vdf_difficulty);
        w.write_vector(self.voting_method.as_bytes());
        w.write_vector(self.title.as_bytes());
        w.write_vector(self.description.as_bytes());
        w.write_byte(self.choices.len() as u8);
        for c in &self.choices {
            w.write_vector(c.as_bytes());
        }
        w.write(&self.eligibility_list.bytes());
        w.into_bytes()
    }

    pub fn from_bytes(p: &[u8]) -> Result<Self> {
        let mut r = BufferReader::new(p);
        let version = r.read_uint32()?;
        if version != PARAMS_VERSION {
            return Err(Error::UnknownVersion);
        }
        let cast_start = r.read_uint64()?;
        let tally_start = r.read_uint64()?;
        let tally_end = r.read_uint64()?;
        let max_vdf_difficulty = r.read_uint64()?;
        let voting_method = String::from_utf8_lossy(r.read_vector()?).into_owned();
        let title = String::from_utf8_lossy(r.read_vector()?).into_owned();
        let description = String::from_utf8_lossy(r.read_vector()?).into_owned();
        let num_choices = r.read_byte()?;
        let mut choices = Vec::with_capacity(num_choices as usize);
        for _ in 0..num_choices {
            choices.push(String::from_utf8_lossy(r.read_vector()?).into_owned());
        }
        let eligibility_list = EligibilityList::from_bytes(r.read_remaining())?;
        Ok(ElectionParams {
            version,
            cast_start,
            tally_start,
            tally_end,
            max_vdf_difficulty,
            voting_method,
            title,
            description,
            choices,
            eligibility_list,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> ElectionParams {
        let mut ell = EligibilityList::new();
        ell.add(hash(b"voter-1"), [0; 32]);
        ell.add(hash(b"voter-2"), [0; 32]);
        ElectionParams {
            version: 0,
            cast_start: 1_700_000_020,
            tally_start: 1_700_000_040,
            tally_end: 1_700_000_060,
            max_vdf_difficulty: 1_000_000,
            voting_method: "Plurality".to_string(),
            title: "Board seat".to_string(),
            description: "Annual board election".to_string(),
            choices: vec!["Yes".to_string(), "No".to_string()],
            eligibility_list: ell,
        }
    }

    #[test]
    fn bytes_round_trip() {
        let params = sample_params();
        let decoded = ElectionParams::from_bytes(&params.bytes()).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn rejects_unknown_version() {
        let mut params = sample_params();
        params.version = 1;
        assert!(matches!(
            ElectionParams::from_bytes(&params.bytes()),
            Err(Error::UnknownVersion)
        ));
    }

    #[test]
    fn phase_function() {
        let params = sample_params();
        assert_eq!(params.phase_at(1_700_000_000), ElectionPhase::CredGen);
        assert_eq!(params.phase_at(1_700_000_019), ElectionPhase::CredGen);
        assert_eq!(params.phase_at(1_700_000_020), ElectionPhase::Cast);
        assert_eq!(params.phase_at(1_700_000_039), ElectionPhase::Cast);
        assert_eq!(params.phase_at(1_700_000_040), ElectionPhase::Tally);
        assert_eq!(params.phase_at(1_700_000_059), ElectionPhase::Tally);
        assert_eq!(params.phase_at(1_700_000_060), ElectionPhase::End);
        assert_eq!(params.phase_at(u64::MAX), ElectionPhase::End);
    }

    #[test]
    fn phase_is_monotone() {
        let params = sample_params();
        let mut last = ElectionPhase::Setup;
        for t in (1_699_999_990..1_700_000_070).step_by(7) {
            let phase = params.phase_at(t);
            assert!(phase >= last);
            last = phase;
        }
    }

    #[test]
    fn validate_checks_ordering_and_method() {
        let mut params = sample_params();
        params.validate().unwrap();

        params.tally_start = params.cast_start;
        assert!(params.validate().is_err());

        let mut params = sample_params();
        params.voting_method = "Condorcet".to_string();
        assert!(matches!(
            params.validate(),
            Err(Error::UnknownMethod(_))
        ));

        let mut params = sample_params();
        params.choices.clear();
        assert!(params.validate().is_err());
    }
}
