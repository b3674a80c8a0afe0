//! Voting method registry.
//!
//! A method turns caller choice indices into a plaintext ballot and folds a
//! pile of decrypted ballots into a tally. Methods are looked up by the name
//! recorded in the election parameters and parameterized by the choice list.

use crate::*;
use indexmap::IndexMap;
use tallystick::approval::DefaultApprovalTally;
use tallystick::plurality::DefaultPluralityTally;

/// Tally of an election: choice label to vote count, insertion-ordered.
pub type Tally = IndexMap<String, u64>;

pub trait VotingMethod {
    fn name(&self) -> &'static str;
    fn vote(&self, choices: &[usize]) -> Result<Ballot>;
    /// Malformed plaintext ballots are skipped; the tally is set-like and
    /// independent of ballot order.
    fn tally(&self, ballots: &[Ballot]) -> Tally;
}

pub fn get(name: &str, choices: &[String]) -> Result<Box<dyn VotingMethod>> {
    match name {
        "Plurality" => Ok(Box::new(PluralityVoting {
            choices: choices.to_vec(),
        })),
        "Approval" => Ok(Box::new(ApprovalVoting {
            choices: choices.to_vec(),
        })),
        _ => Err(Error::UnknownMethod(name.to_string())),
    }
}

/// One choice per ballot; the ballot encodes the choice index as one byte.
pub struct PluralityVoting {
    choices: Vec<String>,
}

impl VotingMethod for PluralityVoting {
    fn name(&self) -> &'static str {
        "Plurality"
    }

    fn vote(&self, choices: &[usize]) -> Result<Ballot> {
        if choices.len() != 1 {
            return Err(Error::InvalidChoice(choices.len()));
        }
        let idx = choices[0];
        if idx >= self.choices.len() {
            return Err(Error::InvalidChoice(idx));
        }
        Ok(Ballot(vec![idx as u8]))
    }

    fn tally(&self, ballots: &[Ballot]) -> Tally {
        let mut tally = DefaultPluralityTally::new(1);
        for ballot in ballots {
            if ballot.0.len() != 1 {
                continue;
            }
            let idx = ballot.0[0] as usize;
            if idx >= self.choices.len() {
                continue;
            }
            tally.add_ref(&self.choices[idx]);
        }

        let mut totals = IndexMap::new();
        for (candidate, total) in tally.totals() {
            totals.insert(candidate, total);
        }
        totals
    }
}

/// Any number of distinct choices per ballot; the ballot encodes the approved
/// indices one byte each.
pub struct ApprovalVoting {
    choices: Vec<String>,
}

impl VotingMethod for ApprovalVoting {
    fn name(&self) -> &'static str {
        "Approval"
    }

    fn vote(&self, choices: &[usize]) -> Result<Ballot> {
        if choices.is_empty() || choices.len() > self.choices.len() {
            return Err(Error::InvalidChoice(choices.len()));
        }
        let mut seen = vec![false; self.choices.len()];
        let mut encoded = Vec::with_capacity(choices.len());
        for &idx in choices {
            if idx >= self.choices.len() || seen[idx] {
                return Err(Error::InvalidChoice(idx));
            }
            seen[idx] = true;
            encoded.push(idx as u8);
        }
        Ok(Ballot(encoded))
    }

    fn tally(&self, ballots: &[Ballot]) -> Tally {
        let mut tally = DefaultApprovalTally::new(1);
        for ballot in ballots {
            if ballot.0.is_empty() || ballot.0.len() > self.choices.len() {
                continue;
            }
            let mut approved = Vec::with_capacity(ballot.0.len());
            for &b in &ballot.0 {
                let idx = b as usize;
                if idx >= self.choices.len() || approved.contains(&self.choices[idx]) {
                    approved.clear();
                    break;
                }
                approved.push(self.choices[idx].clone());
            }
            if approved.is_empty() {
                continue;
            }
            tally.add_ref(&approved);
        }

        let mut totals = IndexMap::new();
        for (candidate, total) in tally.totals() {
            totals.insert(candidate, total);
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choices() -> Vec<String> {
        vec!["Red".to_string(), "Green".to_string(), "Blue".to_string()]
    }

    #[test]
    fn registry() {
        assert!(get("Plurality", &choices()).is_ok());
        assert!(get("Approval", &choices()).is_ok());
        assert!(matches!(
            get("Borda", &choices()),
            Err(Error::UnknownMethod(_))
        ));
    }

    #[test]
    fn plurality_vote_and_tally() {
        let method = get("Plurality", &choices()).unwrap();

        assert!(matches!(method.vote(&[]), Err(Error::InvalidChoice(_))));
        assert!(matches!(method.vote(&[0, 1]), Err(Error::InvalidChoice(_))));
        assert!(matches!(method.vote(&[3]), Err(Error::InvalidChoice(3))));

        let ballots = vec![
            method.vote(&[1]).unwrap(),
            method.vote(&[1]).unwrap(),
            method.vote(&[2]).unwrap(),
            Ballot(vec![77]), // out of range, skipped
            Ballot(vec![]),   // malformed, skipped
        ];
        let tally = method.tally(&ballots);
        assert_eq!(tally.get("Green"), Some(&2));
        assert_eq!(tally.get("Blue"), Some(&1));
        assert_eq!(tally.get("Red"), None);
    }

    #[test]
    fn approval_vote_and_tally() {
        let method = get("Approval", &choices()).unwrap();

        assert!(method.vote(&[]).is_err());
        assert!(method.vote(&[0, 0]).is_err());
        assert!(method.vote(&[0, 3]).is_err());

        let ballots = vec![
            method.vote(&[0, 2]).unwrap(),
            method.vote(&[2]).unwrap(),
        ];
        let tally = method.tally(&ballots);
        assert_eq!(tally.get("Red"), Some(&1));
        assert_eq!(tally.get("Blue"), Some(&2));
    }

    #[test]
    fn tally_is_order_independent() {
        let method = get("Plurality", &choices()).unwrap();
        let mut ballots = vec![
            method.vote(&[0]).unwrap(),
            method.vote(&[1]).unwrap(),
            method.vote(&[1]).unwrap(),
        ];
        let forward = method.tally(&ballots);
        ballots.reverse();
        assert_eq!(method.tally(&ballots), forward);
    }
}
