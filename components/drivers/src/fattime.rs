//! Packed FAT timestamps and the monitor clock
//!
//! ```text
//!   31..25  year - 1980
//!   24..21  month (1..=12)
//!   20..16  day (1..=31)
//!   15..11  hour
//!   10..5   minute
//!    4..0   second / 2
//! ```
//!
//! There is no RTC on the board: the clock only holds whatever the user last
//! set, starting from a fixed boot value.

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

/// Broken-down calendar time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    /// Boot value used until the clock is set
    pub const DEFAULT: Self = Self {
        year: 2026,
        month: 1,
        day: 17,
        hour: 12,
        minute: 0,
        second: 0,
    };

    pub const MIN_YEAR: u16 = 1980;
    pub const MAX_YEAR: u16 = 1980 + 127;
}

impl Default for DateTime {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// `YYYY-MM-DD HH:MM:SS`
impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// A timestamp in the FAT bit layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatTime(pub u32);

impl FatTime {
    /// Pack `dt`. Out-of-range fields are truncated to their bit width and
    /// odd seconds round down.
    pub const fn pack(dt: DateTime) -> Self {
        let year = (dt.year.wrapping_sub(DateTime::MIN_YEAR) as u32) & 0x7F;
        Self(
            (year << 25)
                | ((dt.month as u32 & 0x0F) << 21)
                | ((dt.day as u32 & 0x1F) << 16)
                | ((dt.hour as u32 & 0x1F) << 11)
                | ((dt.minute as u32 & 0x3F) << 5)
                | ((dt.second as u32 / 2) & 0x1F),
        )
    }

    pub const fn unpack(self) -> DateTime {
        let v = self.0;
        DateTime {
            year: DateTime::MIN_YEAR + ((v >> 25) & 0x7F) as u16,
            month: ((v >> 21) & 0x0F) as u8,
            day: ((v >> 16) & 0x1F) as u8,
            hour: ((v >> 11) & 0x1F) as u8,
            minute: ((v >> 5) & 0x3F) as u8,
            second: ((v & 0x1F) * 2) as u8,
        }
    }

    /// Date half, as stored in a directory entry
    pub const fn date_word(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// Time half, as stored in a directory entry
    pub const fn time_word(self) -> u16 {
        self.0 as u16
    }
}

impl From<DateTime> for FatTime {
    fn from(dt: DateTime) -> Self {
        Self::pack(dt)
    }
}

/// The monitor's wall clock
///
/// Written by `date`, read by the filesystem on every create/modify. Lives in
/// a static, hence the atomic; the core is single-threaded so relaxed
/// ordering is enough.
#[derive(Debug)]
pub struct Clock {
    packed: AtomicU32,
}

impl Clock {
    pub const fn new() -> Self {
        Self::starting_at(DateTime::DEFAULT)
    }

    pub const fn starting_at(dt: DateTime) -> Self {
        Self {
            packed: AtomicU32::new(FatTime::pack(dt).0),
        }
    }

    pub fn get(&self) -> FatTime {
        FatTime(self.packed.load(Ordering::Relaxed))
    }

    pub fn set(&self, time: FatTime) {
        self.packed.store(time.0, Ordering::Relaxed);
    }

    pub fn now(&self) -> DateTime {
        self.get().unpack()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> DateTime {
        DateTime {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    #[test]
    fn boot_value_is_fixed() {
        let clock = Clock::new();
        assert_eq!(clock.now(), DateTime::DEFAULT);
        assert_eq!(
            FatTime::pack(DateTime::DEFAULT).0,
            (46 << 25) | (1 << 21) | (17 << 16) | (12 << 11)
        );
    }

    #[test]
    fn pack_unpack_round_trips_over_the_valid_range() {
        for year in [1980, 1999, 2026, 2079, 2107] {
            for month in 1..=12 {
                for (day, hour, minute) in [(1, 0, 0), (15, 12, 30), (31, 23, 59)] {
                    for second in (0..=58).step_by(2) {
                        let t = dt(year, month, day, hour, minute, second);
                        assert_eq!(FatTime::pack(t).unpack(), t);
                    }
                }
            }
        }
    }

    #[test]
    fn odd_seconds_truncate() {
        let t = dt(2026, 1, 17, 12, 0, 59);
        assert_eq!(FatTime::pack(t).unpack().second, 58);
    }

    #[test]
    fn halves_split_date_and_time() {
        let t = FatTime::pack(dt(2000, 2, 29, 13, 45, 20));
        assert_eq!(t.date_word(), ((20 << 9) | (2 << 5) | 29) as u16);
        assert_eq!(t.time_word(), ((13 << 11) | (45 << 5) | 10) as u16);
    }

    #[test]
    fn clock_set_then_get() {
        let clock = Clock::new();
        let t = dt(2030, 6, 1, 8, 15, 42);
        clock.set(t.into());
        assert_eq!(clock.now(), t);
    }

    #[test]
    fn display_is_zero_padded() {
        let t = dt(2026, 1, 7, 3, 4, 6);
        assert_eq!(std::format!("{}", t), "2026-01-07 03:04:06");
    }
}
