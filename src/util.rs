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

/// Formats milliseconds as a subtitle timestamp, `h:mm:ss.cc`.
pub fn timestamp(ms: u64) -> String {
    let centis = ms / 10;
    let hours = centis / 360_000;
    let minutes = centis / 6_000 % 60;
    let seconds = centis / 100 % 60;
    format!("{}:{:02}:{:02}.{:02}", hours, minutes, seconds, centis % 100)
}

#[cfg(test)]
mod test {
    use crate::util::timestamp;

    #[test]
    fn test_timestamps() {
        assert_eq!("0:00:00.00", timestamp(0));
        assert_eq!("0:00:00.00", timestamp(9));
        assert_eq!("0:00:01.23", timestamp(1234));
        assert_eq!("0:01:00.00", timestamp(60_000));
        assert_eq!("1:02:03.45", timestamp(3_723_450));
        assert_eq!("27:46:40.00", timestamp(100_000_000));
    }
}
