//! ats-seed: populate the database with realistic sample candidates.
//!
//! Every record goes through the candidate service, so the usual validation
//! and uniqueness rules apply. Duplicates are reported and skipped.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use ats_api::logging::{self, LogConfig};
use ats_core::{CandidateError, CandidatePayload, CandidateService};
use ats_db::Database;

#[derive(Parser)]
#[command(name = "ats-seed")]
#[command(author, version, about = "Seed the applicant tracking database with sample candidates")]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", default_value = "postgres://localhost/ats")]
    database_url: String,

    /// Delete all existing candidates first
    #[arg(long)]
    purge: bool,

    /// CV file to attach to the first candidate
    #[arg(long)]
    cv: Option<PathBuf>,

    /// Do not apply pending migrations
    #[arg(long)]
    skip_migrations: bool,
}

struct SampleCandidate {
    document: Option<&'static str>,
    first_name: &'static str,
    last_name: &'static str,
    email: &'static str,
    phone: &'static str,
    address: &'static str,
    education: &'static str,
    experience: &'static str,
}

const SAMPLES: &[SampleCandidate] = &[
    SampleCandidate {
        document: Some("12345678A"),
        first_name: "María",
        last_name: "González",
        email: "maria.gonzalez@gmail.com",
        phone: "+34 612 345 678",
        address: "Calle Mayor 123, Madrid, Spain",
        education: "Computer Engineering - Universidad Politécnica de Madrid (2018)",
        experience: "Full Stack Developer at TechCorp (2019-2023), React and Node.js",
    },
    SampleCandidate {
        document: Some("X1234567"),
        first_name: "Juan",
        last_name: "Pérez",
        email: "juan.perez@gmail.com",
        phone: "+34 622 111 222",
        address: "Avenida Diagonal 456, Barcelona, Spain",
        education: "Industrial Engineering - UPC (2017)",
        experience: "Process Engineer at Seat (2018-2023)",
    },
    SampleCandidate {
        document: Some("98765432Z"),
        first_name: "Lucía",
        last_name: "Martínez",
        email: "lucia.martinez@gmail.com",
        phone: "+34 633 222 333",
        address: "Gran Vía 789, Valencia, Spain",
        education: "Psychology - Universidad de Valencia (2019)",
        experience: "Clinical Psychologist at Hospital La Fe (2020-2023)",
    },
    SampleCandidate {
        document: Some("Y7654321"),
        first_name: "Carlos",
        last_name: "Sánchez",
        email: "carlos.sanchez@gmail.com",
        phone: "+34 644 333 444",
        address: "Calle Real 101, Sevilla, Spain",
        education: "Law - Universidad de Sevilla (2016)",
        experience: "Lawyer in private practice (2017-2023)",
    },
    SampleCandidate {
        document: Some("M1234567"),
        first_name: "Ana",
        last_name: "López",
        email: "ana.lopez@gmail.com",
        phone: "+34 655 444 555",
        address: "Paseo de la Castellana 202, Madrid, Spain",
        education: "Business Administration - Universidad Autónoma de Madrid (2015)",
        experience: "Consultant at Deloitte (2016-2023)",
    },
    SampleCandidate {
        document: None,
        first_name: "Luis",
        last_name: "Fernández",
        email: "luis.fernandez@hotmail.com",
        phone: "+34 645 678 901",
        address: "Calle Gran Vía 89, Sevilla, Spain",
        education: "Medicine - Universidad de Sevilla (2016)",
        experience: "Resident Physician at Hospital Virgen del Rocío (2017-2023)",
    },
    SampleCandidate {
        document: None,
        first_name: "Isabel",
        last_name: "López",
        email: "isabel.lopez@protonmail.com",
        phone: "+34 656 789 012",
        address: "Paseo de la Castellana 234, Madrid, Spain",
        education: "Digital Marketing - IE Business School (2020)",
        experience: "Marketing Manager at Coca-Cola (2021-2023)",
    },
    SampleCandidate {
        document: None,
        first_name: "Miguel",
        last_name: "Sánchez",
        email: "miguel.sanchez@icloud.com",
        phone: "+34 667 890 123",
        address: "Carrer de Balmes 156, Barcelona, Spain",
        education: "Architecture - Universitat Politècnica de Catalunya (2018)",
        experience: "Architect at Foster + Partners (2019-2023)",
    },
    SampleCandidate {
        document: None,
        first_name: "Carmen",
        last_name: "Pérez",
        email: "carmen.perez@live.com",
        phone: "+34 678 901 234",
        address: "Calle Sierpes 78, Sevilla, Spain",
        education: "Journalism - Universidad de Sevilla (2017)",
        experience: "Technology Journalist at El País (2018-2023)",
    },
    SampleCandidate {
        document: None,
        first_name: "Javier",
        last_name: "García",
        email: "javier.garcia@aol.com",
        phone: "+34 689 012 345",
        address: "Avenida Diagonal 567, Barcelona, Spain",
        education: "Physics - Universitat de Barcelona (2019)",
        experience: "Particle Physics Researcher at CERN (2020-2023)",
    },
    SampleCandidate {
        document: None,
        first_name: "Elena",
        last_name: "Moreno",
        email: "elena.moreno@yandex.com",
        phone: "+34 690 123 456",
        address: "Calle de Alcalá 890, Madrid, Spain",
        education: "Psychology - Universidad Complutense de Madrid (2018)",
        experience: "Clinical Psychologist in private practice (2019-2023)",
    },
    SampleCandidate {
        document: None,
        first_name: "David",
        last_name: "Jiménez",
        email: "david.jimenez@mail.com",
        phone: "+34 601 234 567",
        address: "Calle Colón 123, Valencia, Spain",
        education: "Industrial Engineering - Universitat Politècnica de València (2017)",
        experience: "Project Manager at Siemens (2018-2023)",
    },
    SampleCandidate {
        document: None,
        first_name: "Laura",
        last_name: "Ruiz",
        email: "laura.ruiz@fastmail.com",
        phone: "+34 612 345 678",
        address: "Paseo de Gracia 456, Barcelona, Spain",
        education: "Graphic Design - Escola Massana (2019)",
        experience: "Senior Designer at Apple (2020-2023)",
    },
    SampleCandidate {
        document: None,
        first_name: "Francisco",
        last_name: "Díaz",
        email: "francisco.diaz@tutanota.com",
        phone: "+34 623 456 789",
        address: "Calle de la Princesa 789, Madrid, Spain",
        education: "Economics - Universidad Carlos III (2018)",
        experience: "Financial Analyst at Goldman Sachs (2019-2023)",
    },
    SampleCandidate {
        document: None,
        first_name: "Sofía",
        last_name: "Hernández",
        email: "sofia.hernandez@zoho.com",
        phone: "+34 634 567 890",
        address: "Calle San Vicente 234, Valencia, Spain",
        education: "Nursing - Universitat de València (2020)",
        experience: "Nurse at Hospital La Fe (2021-2023)",
    },
    SampleCandidate {
        document: None,
        first_name: "Antonio",
        last_name: "Muñoz",
        email: "antonio.munoz@hushmail.com",
        phone: "+34 645 678 901",
        address: "Avenida de la Libertad 567, Málaga, Spain",
        education: "Tourism - Universidad de Málaga (2019)",
        experience: "Hotel Director at Marriott (2020-2023)",
    },
    SampleCandidate {
        document: None,
        first_name: "Patricia",
        last_name: "Alonso",
        email: "patricia.alonso@guerrillamail.com",
        phone: "+34 656 789 012",
        address: "Calle Real 890, Granada, Spain",
        education: "Art History - Universidad de Granada (2018)",
        experience: "Curator at Museo del Prado (2019-2023)",
    },
];

impl SampleCandidate {
    /// Samples without a real document get `DUMMY` plus their 1-based position.
    fn payload(&self, position: usize) -> CandidatePayload {
        let document = self
            .document
            .map(str::to_string)
            .unwrap_or_else(|| format!("DUMMY{:03}", position + 1));
        CandidatePayload::new()
            .with("document", document)
            .with("firstName", self.first_name)
            .with("lastName", self.last_name)
            .with("email", self.email)
            .with("phone", self.phone)
            .with("address", self.address)
            .with("education", self.education)
            .with("experience", self.experience)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct SeedReport {
    created: usize,
    skipped: usize,
}

async fn seed(
    service: &CandidateService,
    cv: Option<(Vec<u8>, String)>,
) -> anyhow::Result<SeedReport> {
    let mut report = SeedReport::default();
    let mut cv = cv;

    for (position, sample) in SAMPLES.iter().enumerate() {
        let mut payload = sample.payload(position);
        if position == 0 {
            if let Some((bytes, filename)) = cv.take() {
                payload.set_cv(bytes);
                payload.set("cvFilename", filename);
            }
        }

        match service.create(&payload).await {
            Ok(candidate) => {
                info!(
                    document = %candidate.document,
                    "Created {} {}", candidate.first_name, candidate.last_name
                );
                report.created += 1;
            }
            Err(err @ (CandidateError::DuplicateDocument | CandidateError::DuplicateEmail)) => {
                warn!(position, "Skipping sample: {}", err);
                report.skipped += 1;
            }
            Err(CandidateError::ValidationFailed(errors)) => {
                warn!(position, "Skipping invalid sample: {}", errors);
                report.skipped += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(report)
}

async fn run(cli: Cli) -> anyhow::Result<SeedReport> {
    let cv = match &cli.cv {
        Some(path) => {
            let bytes = tokio::fs::read(path).await?;
            let filename = path
                .file_name()
                .and_then(|f| f.to_str())
                .unwrap_or("sample_cv.pdf")
                .to_string();
            Some((bytes, filename))
        }
        None => None,
    };

    let db = Database::connect(&cli.database_url).await?;
    if !cli.skip_migrations {
        db.migrate().await?;
    }
    if cli.purge {
        let removed = db.candidates.purge().await?;
        info!(removed, "Existing candidates removed");
    }

    let service = CandidateService::new(Arc::new(db.candidates.clone()));
    let result = seed(&service, cv).await;
    db.close().await;
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init(&LogConfig::from_env());
    let cli = Cli::parse();

    match run(cli).await {
        Ok(report) => {
            info!(created = report.created, skipped = report.skipped, "Seed finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
