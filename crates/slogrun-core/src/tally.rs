//! Address frequency side tally for vbank balance updates.

use std::collections::BTreeMap;
use std::io::{self, Write};

/// Occurrence count per address, ordered by address.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressTally {
    counts: BTreeMap<String, u64>,
}

impl AddressTally {
    /// Empty tally.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `address`.
    pub fn record(&mut self, address: &str) {
        match self.counts.get_mut(address) {
            Some(n) => *n += 1,
            None => {
                self.counts.insert(address.to_owned(), 1);
            }
        }
    }

    /// Count each address in `addresses`.
    pub fn extend<I, S>(&mut self, addresses: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for a in addresses {
            self.record(a.as_ref());
        }
    }

    /// Occurrences of `address` (0 if never seen).
    #[must_use]
    pub fn get(&self, address: &str) -> u64 {
        self.counts.get(address).copied().unwrap_or(0)
    }

    /// Number of distinct addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether nothing was tallied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// `(address, count)` pairs in address order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.counts.iter().map(|(a, n)| (a.as_str(), *n))
    }

    /// Write `address count` lines in address order.
    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        for (addr, n) in self.iter() {
            writeln!(w, "{addr} {n}")?;
        }
        w.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_orders() {
        let mut t = AddressTally::new();
        t.extend(["b", "a", "b"]);
        assert_eq!(t.get("a"), 1);
        assert_eq!(t.get("b"), 2);
        assert_eq!(t.get("c"), 0);
        assert_eq!(t.len(), 2);

        let mut out = Vec::new();
        t.write_to(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a 1\nb 2\n");
    }
}
