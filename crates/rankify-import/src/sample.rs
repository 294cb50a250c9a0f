//! Sample import file
//!
//! One CSV layout works for both modes: provider imports read `name` as the
//! provider name and fall back from `specialty` to `practice areas`.

use std::io::Write;

/// Default file name for the generated sample
pub const SAMPLE_FILE_NAME: &str = "sample-import.csv";

const SAMPLE_HEADERS: [&str; 19] = [
    "name",
    "license",
    "street address",
    "city",
    "state",
    "zip",
    "website",
    "phone",
    "practice areas",
    "language",
    "honors",
    "work experience",
    "associations",
    "education",
    "speaking engagements",
    "publications",
    "description",
    "image url",
    "specialty",
];

const SAMPLE_ROWS: [[&str; 19]; 2] = [
    [
        "Jane Doe Law",
        "TX-123456",
        "123 Main St",
        "Austin",
        "TX",
        "78701",
        "https://janedoelaw.com",
        "(512) 555-0199",
        "Products Liability: 25%; Trucking Accident: 25%; Wrongful Death: 25%; Litigation: 25%",
        "English; Spanish",
        "Super Lawyers 2024",
        "Trial lawyer with 15+ years experience.",
        "State Bar of Texas; AAJ",
        "J.D., UT Austin",
        "AAJ Trucking Conference 2023",
        "Plaintiff Strategies in Product Cases",
        "Focused on complex product liability and catastrophic injury matters.",
        "https://images.example.com/jane-doe-law.jpg",
        "",
    ],
    [
        "Dr. John Smith",
        "",
        "456 2nd Ave",
        "Seattle",
        "WA",
        "98101",
        "https://smithclinic.com",
        "(206) 555-0123",
        "",
        "English",
        "",
        "",
        "",
        "",
        "",
        "",
        "Board-certified cardiologist focused on complex cardiac care.",
        "https://images.example.com/smith-md.png",
        "Cardiology",
    ],
];

/// Write the sample CSV (header plus two example rows) to `writer`
pub fn write_sample<W: Write>(writer: W) -> csv::Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(writer);

    csv.write_record(SAMPLE_HEADERS)?;
    for row in SAMPLE_ROWS {
        csv.write_record(row)?;
    }
    csv.flush()?;
    Ok(())
}

/// The sample CSV as a string
pub fn sample_csv() -> csv::Result<String> {
    let mut buf = Vec::new();
    write_sample(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
