// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fmt;

/// A half-open range `[begin, end)` of sample indices. The constructor orders
/// its arguments, so a range can never have a negative length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SampleRange {
    begin: u64,
    end: u64,
}

impl SampleRange {
    pub fn new(a: u64, b: u64) -> SampleRange {
        SampleRange {
            begin: a.min(b),
            end: a.max(b),
        }
    }

    pub fn begin(&self) -> u64 {
        self.begin
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn length(&self) -> u64 {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// True if the sample lies inside the range.
    pub fn contains(&self, sample: u64) -> bool {
        sample >= self.begin && sample < self.end
    }

    /// True if the two ranges share at least one sample.
    pub fn overlaps(&self, other: &SampleRange) -> bool {
        self.begin < other.end && other.begin < self.end
    }

    /// Returns a new range with each end moved by its own offset. Ends saturate
    /// at zero and are reordered if they cross.
    pub fn translated(&self, begin_adjust: i64, end_adjust: i64) -> SampleRange {
        SampleRange::new(
            shift(self.begin, begin_adjust),
            shift(self.end, end_adjust),
        )
    }
}

fn shift(value: u64, delta: i64) -> u64 {
    if delta >= 0 {
        value.saturating_add(delta as u64)
    } else {
        value.saturating_sub(delta.unsigned_abs())
    }
}

impl fmt::Display for SampleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.begin, self.end)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_length_never_negative() {
        for (a, b) in [(0, 0), (10, 20), (20, 10), (u64::MAX, 0), (7, 7)] {
            let range = SampleRange::new(a, b);
            assert!(range.end() >= range.begin());
            assert_eq!(range.length(), range.end() - range.begin());
        }
        assert_eq!(SampleRange::new(20, 10), SampleRange::new(10, 20));
    }

    #[test]
    fn test_contains_and_overlaps() {
        let range = SampleRange::new(100, 200);
        assert!(range.contains(100));
        assert!(range.contains(199));
        assert!(!range.contains(200));
        assert!(!range.contains(99));

        assert!(range.overlaps(&SampleRange::new(150, 300)));
        assert!(range.overlaps(&SampleRange::new(0, 101)));
        assert!(!range.overlaps(&SampleRange::new(200, 300)));
        assert!(!range.overlaps(&SampleRange::new(0, 100)));
        assert!(!SampleRange::new(150, 150).overlaps(&range));
    }

    #[test]
    fn test_translated() {
        let range = SampleRange::new(1000, 5000);
        assert_eq!(range.translated(-500, 500), SampleRange::new(500, 5500));
        assert_eq!(range.translated(-2000, 0), SampleRange::new(0, 5000));

        // Crossing ends are swapped rather than producing a negative length.
        let crossed = range.translated(6000, 0);
        assert_eq!(crossed, SampleRange::new(5000, 7000));
        assert_eq!(crossed.length(), 2000);
    }

    #[test]
    fn test_display() {
        assert_eq!(SampleRange::new(3, 9).to_string(), "[3, 9)");
        assert!(SampleRange::default().is_empty());
    }
}
