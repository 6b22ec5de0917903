//! BCDRoundTrip (§8.1): every two-digit decimal field round-trips through
//! the BCD byte encoding. Harness matches the teacher's
//! `file_checkpoint_test`: a plain `fn main()` driving `bolero::check!()`.

use bolero::check;
use zealfs::bcd::BcdDate;

fn main() {
    check!()
        .with_type()
        .for_each(|parts: &(u16, u8, u8, u8, u8, u8, u8)| {
            let (year, month, day, weekday, hour, minute, second) = *parts;
            let date = BcdDate {
                year: year % 10000,
                month: month % 100,
                day: day % 100,
                weekday: weekday % 100,
                hour: hour % 100,
                minute: minute % 100,
                second: second % 100,
            };
            assert_eq!(BcdDate::decode(&date.encode()), date);
        });
}
