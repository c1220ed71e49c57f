//! # Seed Data Generator
//!
//! Populates a database with a small demo school for development.
//!
//! ## Usage
//! ```bash
//! # Default: ./campus_dev.db, 20 students per class
//! cargo run -p campus-db --bin seed
//!
//! # Larger classes
//! cargo run -p campus-db --bin seed -- --students 40
//!
//! # Specify database path
//! cargo run -p campus-db --bin seed -- --db ./data/campus.db
//! ```
//!
//! ## Generated School
//! - Teachers, one per subject
//! - Grades 1-6 for the current academic year, each with a class teacher
//! - Subjects, rooms and an eight-period day
//! - A Monday-Friday timetable without double bookings
//! - Tuition per grade plus school-wide transport and lunch fees
//! - A sibling discount for every fifth student
//! - Invoices for the current month

use chrono::{Datelike, NaiveDate, Utc};
use std::env;

use campus_core::{BillingMonth, DiscountKind, FeeFrequency, Money};
use campus_db::{
    Database, DbConfig, DiscountAssignment, NewClass, NewDiscount, NewFeeStructure, NewPeriod,
    NewRoom, NewStudent, NewSubject, NewTeacher, NewTimetableEntry,
};

const SUBJECTS: &[(&str, &str)] = &[
    ("MATH", "Mathematics"),
    ("ENG", "English"),
    ("KIS", "Kiswahili"),
    ("SCI", "Science"),
    ("SST", "Social Studies"),
    ("CRE", "Religious Education"),
    ("ART", "Creative Arts"),
    ("PE", "Physical Education"),
];

const TEACHERS: &[(&str, &str)] = &[
    ("Mark", "Otieno"),
    ("Grace", "Wanjiru"),
    ("Hassan", "Abdi"),
    ("Mercy", "Chebet"),
    ("Peter", "Kamau"),
    ("Ruth", "Akinyi"),
    ("James", "Mwangi"),
    ("Faith", "Njeri"),
];

const FIRST_NAMES: &[&str] = &[
    "Amina", "Baraka", "Chege", "Dalia", "Eliud", "Fatuma", "Gitau", "Halima", "Imani", "Jabari",
    "Kendi", "Liam", "Makena", "Nuru", "Omondi", "Pendo", "Rehema", "Sifa", "Tumaini", "Zawadi",
];

const LAST_NAMES: &[&str] = &[
    "Hassan", "Ochieng", "Kiprop", "Mutua", "Wambui", "Odhiambo", "Kariuki", "Nyambura",
];

/// Monthly tuition per grade, in whole units.
const TUITION: &[i64] = &[8_000, 8_500, 9_000, 9_500, 10_000, 10_500];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut per_class: usize = 20;
    let mut db_path = String::from("./campus_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--students" | "-s" => {
                if i + 1 < args.len() {
                    per_class = args[i + 1].parse().unwrap_or(20);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Campus Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -s, --students <N>  Students per class (default: 20)");
                println!("  -d, --db <PATH>     Database file path (default: ./campus_dev.db)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let today = Utc::now().date_naive();
    let year = today.year().to_string();

    println!("🌱 Campus Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!("Students per class: {}", per_class);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if !db.teachers().list(true).await?.is_empty() {
        println!("⚠ Database already has staff records");
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();

    // Staff and reference data
    let mut teachers = Vec::new();
    for (first_name, last_name) in TEACHERS {
        let teacher = db
            .teachers()
            .create(&NewTeacher {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                email: format!(
                    "{}.{}@campus.test",
                    first_name.to_lowercase(),
                    last_name.to_lowercase()
                ),
                phone: None,
                hire_date: NaiveDate::from_ymd_opt(today.year(), 1, 2),
            })
            .await?;
        teachers.push(teacher);
    }
    println!("✓ {} teachers", teachers.len());

    let mut subjects = Vec::new();
    for (code, name) in SUBJECTS {
        subjects.push(
            db.catalog()
                .create_subject(&NewSubject {
                    code: code.to_string(),
                    name: name.to_string(),
                })
                .await?,
        );
    }

    let mut periods = Vec::new();
    for n in 0..8u32 {
        let start_minutes = 8 * 60 + n * 40;
        let end_minutes = start_minutes + 35;
        periods.push(
            db.catalog()
                .create_period(&NewPeriod {
                    name: format!("Period {}", n + 1),
                    start_time: format!("{:02}:{:02}", start_minutes / 60, start_minutes % 60),
                    end_time: format!("{:02}:{:02}", end_minutes / 60, end_minutes % 60),
                    sort_order: i64::from(n + 1),
                })
                .await?,
        );
    }
    println!("✓ {} subjects, {} periods", subjects.len(), periods.len());

    // Classes, each in its own room
    let mut classes = Vec::new();
    for grade in 1..=6usize {
        let class = db
            .classes()
            .create(&NewClass {
                name: format!("Grade {}", grade),
                academic_year: year.clone(),
                class_teacher_id: Some(teachers[(grade - 1) % teachers.len()].id.clone()),
            })
            .await?;
        let room = db
            .catalog()
            .create_room(&NewRoom {
                name: format!("Room {}", grade),
                capacity: Some(45),
            })
            .await?;
        classes.push((class, room));
    }
    println!("✓ {} classes", classes.len());

    // Subject s is taught by teacher s. Rotating the subject per class keeps
    // every (teacher, period, day) unique across classes.
    let mut lessons = 0;
    for (c, (class, room)) in classes.iter().enumerate() {
        for day in 1..=5i64 {
            for (p, period) in periods.iter().enumerate() {
                let s = (c + p + day as usize) % subjects.len();
                db.timetable()
                    .create(&NewTimetableEntry {
                        class_id: class.id.clone(),
                        subject_id: subjects[s].id.clone(),
                        teacher_id: teachers[s].id.clone(),
                        room_id: Some(room.id.clone()),
                        period_id: period.id.clone(),
                        day_of_week: day,
                        academic_year: year.clone(),
                    })
                    .await?;
                lessons += 1;
            }
        }
    }
    println!("✓ {} timetable entries", lessons);

    // Fees
    for ((class, _), tuition) in classes.iter().zip(TUITION) {
        db.fees()
            .create_structure(&NewFeeStructure {
                class_id: Some(class.id.clone()),
                name: "Tuition".to_string(),
                amount_cents: Money::from_units(*tuition).cents(),
                frequency: FeeFrequency::Monthly,
                academic_year: year.clone(),
            })
            .await?;
    }
    for (name, units) in [("Transport", 2_000), ("Lunch", 1_500)] {
        db.fees()
            .create_structure(&NewFeeStructure {
                class_id: None,
                name: name.to_string(),
                amount_cents: Money::from_units(units).cents(),
                frequency: FeeFrequency::Monthly,
                academic_year: year.clone(),
            })
            .await?;
    }
    let sibling = db
        .fees()
        .create_discount(&NewDiscount {
            name: "Sibling discount".to_string(),
            kind: DiscountKind::Percentage,
            value: 500,
        })
        .await?;
    println!("✓ Fee structures and discounts");

    // Students
    let mut admitted = 0;
    for (c, (class, _)) in classes.iter().enumerate() {
        for n in 0..per_class {
            let seed = c * per_class + n;
            let student = db
                .students()
                .create(&NewStudent {
                    first_name: FIRST_NAMES[seed % FIRST_NAMES.len()].to_string(),
                    last_name: LAST_NAMES[(seed / FIRST_NAMES.len() + c) % LAST_NAMES.len()].to_string(),
                    class_id: Some(class.id.clone()),
                    date_of_birth: NaiveDate::from_ymd_opt(today.year() - 6 - c as i32, 1 + (seed % 12) as u32, 1 + (seed % 28) as u32),
                    guardian_name: None,
                    guardian_phone: Some(format!("07{:08}", 10_000_000 + seed)),
                    admission_date: NaiveDate::from_ymd_opt(today.year(), 1, 6),
                })
                .await?;

            if seed % 5 == 0 {
                db.fees()
                    .assign_discount(
                        &student.id,
                        &DiscountAssignment {
                            discount_id: sibling.id.clone(),
                            valid_from: NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
                            valid_until: None,
                        },
                    )
                    .await?;
            }
            admitted += 1;
        }
    }
    println!("✓ {} students", admitted);

    // Invoices
    let month = BillingMonth::containing(today);
    let mut invoiced = 0;
    for (class, _) in &classes {
        let result = db.invoices().generate_for_class(&class.id, month, Some("seed")).await?;
        invoiced += result.success.len();
        for failure in &result.failed {
            eprintln!("Failed to invoice {}: {}", failure.data.admission_number, failure.error);
        }
    }
    println!("✓ {} invoices for {}", invoiced, month);

    println!();
    println!("✓ Seed complete in {:?}", start.elapsed());

    Ok(())
}
