//! Specialist and multidisciplinary team workers.
//!
//! Each specialist is one independent analyzer: it builds a role-specific
//! prompt over the shared report text, calls the Gemini API, and converts
//! any transport or API error into the absence marker so a failing
//! consultation never disturbs its siblings.

use crate::agent::gemini::{GeminiClient, GeminiConfig};
use crate::config::ModelConfig;
use crate::models::{AnalyzerSpec, SpecialistReport, SynthesisFactory, Worker};
use futures::future::BoxFuture;
use std::fmt;
use tracing::warn;

/// The fixed set of medical specialties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specialty {
    Cardiologist,
    Psychologist,
    Pulmonologist,
}

impl Specialty {
    pub const ALL: [Specialty; 3] = [
        Specialty::Cardiologist,
        Specialty::Psychologist,
        Specialty::Pulmonologist,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Specialty::Cardiologist => "Cardiologist",
            Specialty::Psychologist => "Psychologist",
            Specialty::Pulmonologist => "Pulmonologist",
        }
    }

    /// Parse a config-file name such as "cardiologist".
    pub fn parse(s: &str) -> Option<Specialty> {
        match s.trim().to_lowercase().as_str() {
            "cardiologist" => Some(Specialty::Cardiologist),
            "psychologist" => Some(Specialty::Psychologist),
            "pulmonologist" => Some(Specialty::Pulmonologist),
            _ => None,
        }
    }

    fn instructions(&self) -> &'static str {
        match self {
            Specialty::Cardiologist => CARDIOLOGIST_PROMPT,
            Specialty::Psychologist => PSYCHOLOGIST_PROMPT,
            Specialty::Pulmonologist => PULMONOLOGIST_PROMPT,
        }
    }

    fn prompt(&self, report_text: &str) -> String {
        format!("{}\n\nMedical Report:\n{}", self.instructions(), report_text)
    }
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One specialist consultation over the shared report.
pub struct Specialist {
    specialty: Specialty,
    report_text: String,
    client: GeminiClient,
}

impl Worker for Specialist {
    fn run(&self) -> BoxFuture<'_, Option<String>> {
        Box::pin(async move {
            let prompt = self.specialty.prompt(&self.report_text);
            match self.client.generate(&prompt).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("{} consultation failed: {:#}", self.specialty, e);
                    None
                }
            }
        })
    }
}

/// The synthesis worker combining every specialist's findings.
pub struct MultidisciplinaryTeam {
    reports: Vec<SpecialistReport>,
    client: GeminiClient,
}

impl MultidisciplinaryTeam {
    fn prompt(&self) -> String {
        let mut prompt = String::from(TEAM_PROMPT);
        for report in &self.reports {
            prompt.push_str(&format!(
                "\n\n{} Report:\n{}",
                report.specialist, report.findings
            ));
        }
        prompt
    }
}

impl Worker for MultidisciplinaryTeam {
    fn run(&self) -> BoxFuture<'_, Option<String>> {
        Box::pin(async move {
            match self.client.generate(&self.prompt()).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("Multidisciplinary team synthesis failed: {:#}", e);
                    None
                }
            }
        })
    }
}

fn client_for(model: &ModelConfig, api_key: &str) -> GeminiClient {
    GeminiClient::new(GeminiConfig {
        api_url: model.api_url.clone(),
        model: model.name.clone(),
        api_key: api_key.to_string(),
        temperature: model.temperature,
        timeout_seconds: model.timeout_seconds,
    })
}

/// Build one analyzer spec per enabled specialty.
pub fn specialist_specs(model: &ModelConfig, enabled: &[Specialty]) -> Vec<AnalyzerSpec> {
    enabled
        .iter()
        .copied()
        .map(|specialty| {
            let model = model.clone();
            AnalyzerSpec::new(
                specialty.name(),
                Box::new(move |input| {
                    Box::new(Specialist {
                        specialty,
                        report_text: input.report_text.clone(),
                        client: client_for(&model, &input.api_key),
                    })
                }),
            )
        })
        .collect()
}

/// Build the synthesis factory for the multidisciplinary team.
pub fn team_factory(model: &ModelConfig, api_key: &str) -> SynthesisFactory {
    let model = model.clone();
    let api_key = api_key.to_string();
    Box::new(move |reports| {
        Box::new(MultidisciplinaryTeam {
            reports: reports.to_vec(),
            client: client_for(&model, &api_key),
        })
    })
}

const CARDIOLOGIST_PROMPT: &str = "\
You are a cardiologist reviewing a patient's medical report.
Focus on cardiac workup: ECG findings, blood tests, Holter monitor results,
and echocardiogram data. Identify any subtle signs of cardiac dysfunction
or arrhythmia the initial workup may have missed, and recommend next steps
(further testing or monitoring). Answer only with the possible cardiac
issues and the recommended next steps.";

const PSYCHOLOGIST_PROMPT: &str = "\
You are a psychologist reviewing a patient's medical report.
Assess for mental health conditions such as panic disorder, anxiety, or
trauma-related symptoms, and how they could explain the reported episodes.
Recommend next steps (therapy, evaluation, or other interventions). Answer
only with the possible mental health issues and the recommended next steps.";

const PULMONOLOGIST_PROMPT: &str = "\
You are a pulmonologist reviewing a patient's medical report.
Assess for respiratory conditions such as asthma, breathing pattern
disorders, or other pulmonary causes of the reported symptoms. Recommend
next steps (pulmonary function tests, further evaluation, or monitoring).
Answer only with the possible respiratory issues and the recommended next
steps.";

const TEAM_PROMPT: &str = "\
You are a multidisciplinary team of healthcare professionals.
You will receive one report per specialist for the same patient. Combine
them, review the findings together, and list the three most likely health
issues for this patient with a short reasoning for each.";
