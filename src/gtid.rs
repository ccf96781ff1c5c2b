//! GTID set parsing and subset/superset algebra.
//!
//! Textual form: `uuid:lo-hi[,uuid:lo-hi]*`, where a bare `n` is shorthand for
//! `n-n`. The empty string is the empty set, not an error.

use crate::errors::AgentError;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interval {
    pub lo: u64,
    pub hi: u64,
}

/// A parsed `gtid_executed`-style set, grouped by source UUID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GtidSet {
    intervals: BTreeMap<String, Vec<Interval>>,
}

impl GtidSet {
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Parses the textual `gtid_executed` representation.
    pub fn parse(text: &str) -> Result<Self, AgentError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(GtidSet::default());
        }

        let mut intervals: BTreeMap<String, Vec<Interval>> = BTreeMap::new();
        for component in text.split(',') {
            let component = component.trim();
            if component.is_empty() {
                continue;
            }
            let (uuid, range) = component.split_once(':').ok_or_else(|| {
                AgentError::InvalidGtid(format!("missing ':' in component '{component}'"))
            })?;
            if uuid.is_empty() {
                return Err(AgentError::InvalidGtid(format!(
                    "empty uuid in component '{component}'"
                )));
            }
            let interval = if let Some((lo, hi)) = range.split_once('-') {
                let lo: u64 = lo
                    .parse()
                    .map_err(|_| AgentError::InvalidGtid(format!("bad interval '{range}'")))?;
                let hi: u64 = hi
                    .parse()
                    .map_err(|_| AgentError::InvalidGtid(format!("bad interval '{range}'")))?;
                if lo > hi {
                    return Err(AgentError::InvalidGtid(format!(
                        "interval lo > hi in '{range}'"
                    )));
                }
                Interval { lo, hi }
            } else {
                let n: u64 = range
                    .parse()
                    .map_err(|_| AgentError::InvalidGtid(format!("bad interval '{range}'")))?;
                Interval { lo: n, hi: n }
            };
            intervals
                .entry(uuid.to_ascii_lowercase())
                .or_default()
                .push(interval);
        }
        for ivs in intervals.values_mut() {
            ivs.sort();
        }
        Ok(GtidSet { intervals })
    }

    /// True iff every interval of `other` is fully covered by this set under
    /// the matching UUID. The empty set is contained by any set.
    pub fn contains(&self, other: &GtidSet) -> bool {
        other.intervals.iter().all(|(uuid, other_ivs)| {
            let Some(mine) = self.intervals.get(uuid) else {
                return false;
            };
            other_ivs
                .iter()
                .all(|oiv| mine.iter().any(|miv| miv.lo <= oiv.lo && oiv.hi <= miv.hi))
        })
    }
}

impl fmt::Display for GtidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (uuid, ivs) in &self.intervals {
            for iv in ivs {
                if !first {
                    write!(f, ",")?;
                }
                first = false;
                if iv.lo == iv.hi {
                    write!(f, "{uuid}:{}", iv.lo)?;
                } else {
                    write!(f, "{uuid}:{}-{}", iv.lo, iv.hi)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_empty() {
        let set = GtidSet::parse("").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn parses_single_interval() {
        let set = GtidSet::parse("aaaa-bbbb:1-10").unwrap();
        assert_eq!(set.to_string(), "aaaa-bbbb:1-10");
    }

    #[test]
    fn parses_bare_number() {
        let set = GtidSet::parse("aaaa:5").unwrap();
        assert_eq!(set.to_string(), "aaaa:5");
    }

    #[test]
    fn rejects_missing_colon() {
        assert!(GtidSet::parse("aaaa1-10").is_err());
    }

    #[test]
    fn rejects_empty_uuid() {
        assert!(GtidSet::parse(":1-10").is_err());
    }

    #[test]
    fn empty_is_contained_by_anything() {
        let empty = GtidSet::default();
        let full = GtidSet::parse("u:1-10").unwrap();
        assert!(full.contains(&empty));
        assert!(empty.contains(&empty));
    }

    #[test]
    fn reflexive_containment() {
        let set = GtidSet::parse("u:1-10,v:1-5").unwrap();
        assert!(set.contains(&set));
    }

    #[test]
    fn superset_contains_subset() {
        let superset = GtidSet::parse("u:1-20").unwrap();
        let subset = GtidSet::parse("u:1-10").unwrap();
        assert!(superset.contains(&subset));
        assert!(!subset.contains(&superset));
    }

    #[test]
    fn diverged_sets_do_not_contain_each_other() {
        let a = GtidSet::parse("u:1-20").unwrap();
        let b = GtidSet::parse("u:1-10,v:1-10").unwrap();
        assert!(!a.contains(&b));
        assert!(!b.contains(&a));
    }

    #[test]
    fn missing_uuid_is_not_contained() {
        let a = GtidSet::parse("u:1-20").unwrap();
        let b = GtidSet::parse("v:1-5").unwrap();
        assert!(!a.contains(&b));
    }
}
