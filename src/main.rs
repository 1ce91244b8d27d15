use retrace::{PatternCache, Regex, RegexFlags};

fn main() -> Result<(), retrace::Error> {
    let cache = PatternCache::default();

    let text = "Meetings on 2023-10-26 and 2023-11-02.";
    let dates = Regex::new(r"(?P<year>\d{4})-(?P<month>\d{2})-(?P<day>\d{2})")?;
    for m in dates.find_iter(text) {
        println!(
            "{} -> year {}, month {}, day {}",
            m.as_str(),
            m.name("year").unwrap().text,
            m.name("month").unwrap().text,
            m.name("day").unwrap().text,
        );
    }

    let redacted = cache.substitute(
        "My phone number is 123-456-7890.",
        r"\d{3}-\d{3}-\d{4}",
        "[REDACTED]",
    )?;
    println!("{redacted}");

    let fruits = cache.split("apple,banana;cherry-date", "[,;-]")?;
    println!("{fruits:?}");

    let greetings = Regex::with_flags("hello", RegexFlags::IGNORECASE)?;
    println!("{:?}", greetings.find_all("Hello world, hELLO again"));

    Ok(())
}
