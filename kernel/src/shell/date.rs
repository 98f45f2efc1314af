//! `date`: show or set the clock

use picomon_drivers::{DateTime, FatTime};

use super::parse::{parse_decimals, ArgError};
use crate::context::KernelContext;
use crate::platform::{Devices, Platform};

/// Calendar fields from `YYYY MM DD HH MM SS`
///
/// Year and month are range-checked. The other fields keep only the bits the
/// packed format has room for.
pub fn parse_date(args: &str) -> Result<DateTime, ArgError> {
    let [year, month, day, hour, minute, second] = parse_decimals::<6>(args)?;
    let year = u16::try_from(year).map_err(|_| ArgError::OutOfRange)?;
    if !(DateTime::MIN_YEAR..=DateTime::MAX_YEAR).contains(&year) || !(1..=12).contains(&month) {
        return Err(ArgError::OutOfRange);
    }
    Ok(DateTime {
        year,
        month: month as u8,
        day: day as u8,
        hour: hour as u8,
        minute: minute as u8,
        second: second as u8,
    })
}

pub fn date<P: Platform>(dev: &mut Devices<P>, ctx: KernelContext, args: &str) -> KernelContext {
    match args {
        "-h" | "--help" => {
            outln!(dev, "Usage:");
            outln!(dev, "  date                       Show current time");
            outln!(dev, "  date YYYY MM DD HH MM SS   Set time");
            ctx
        }
        "" => {
            outln!(dev, "Current Time: {}", ctx.time.unpack());
            ctx
        }
        _ => match parse_date(args) {
            Ok(now) => {
                outln!(dev, "Time updated.");
                KernelContext {
                    time: FatTime::pack(now),
                    ..ctx
                }
            }
            Err(err) => {
                log::debug!("date rejected: {:?}", err);
                outln!(dev, "Invalid date format. Try: date -h");
                ctx
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::devices;
    use picomon_vfs::mem::MemFs;

    #[test]
    fn set_then_show() {
        let mut dev = devices(MemFs::new());
        let ctx = KernelContext::default();
        let ctx = date(&mut dev, ctx, "2026 1 17 12 0 0");
        let ctx = date(&mut dev, ctx, "");
        assert_eq!(
            dev.console.take_text(),
            "Time updated.\r\nCurrent Time: 2026-01-17 12:00:00\r\n"
        );
        assert_eq!(ctx.time.unpack(), DateTime::DEFAULT);
    }

    #[test]
    fn odd_seconds_round_down() {
        let mut dev = devices(MemFs::new());
        let ctx = date(&mut dev, KernelContext::default(), "1999 12 31 23 59 59");
        date(&mut dev, ctx, "");
        assert!(dev
            .console
            .take_text()
            .ends_with("Current Time: 1999-12-31 23:59:58\r\n"));
    }

    #[test]
    fn rejected_dates_leave_the_clock_alone() {
        let mut dev = devices(MemFs::new());
        let before = KernelContext::default();
        for bad in [
            "1979 1 1 0 0 0",
            "2108 1 1 0 0 0",
            "2026 0 1 0 0 0",
            "2026 13 1 0 0 0",
            "2026 1 17",
            "2026 1 17 12 0 0 9",
            "tomorrow",
        ] {
            let after = date(&mut dev, before, bad);
            assert_eq!(after, before, "{bad}");
            assert_eq!(
                dev.console.take_text(),
                "Invalid date format. Try: date -h\r\n",
                "{bad}"
            );
        }
    }

    #[test]
    fn help_flags() {
        for flag in ["-h", "--help"] {
            let mut dev = devices(MemFs::new());
            date(&mut dev, KernelContext::default(), flag);
            let text = dev.console.take_text();
            assert!(text.starts_with("Usage:\r\n"));
            assert!(text.contains("  date YYYY MM DD HH MM SS   Set time\r\n"));
        }
    }

    #[test]
    fn boundary_years() {
        assert_eq!(parse_date("1980 1 1 0 0 0").map(|d| d.year), Ok(1980));
        assert_eq!(parse_date("2107 12 31 23 59 58").map(|d| d.year), Ok(2107));
        assert_eq!(parse_date("70000 1 1 0 0 0"), Err(ArgError::OutOfRange));
    }
}
