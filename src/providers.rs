use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use image::imageops::FilterType;
use rand::rngs::StdRng;
use rand::Rng;

/// Identity of a remote (or stand-in) training project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectId(pub String);

/// Identity of a tag within a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagId(pub String);

/// A created tag: identity plus the class name it was created for
#[derive(Debug, Clone)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

/// One entry of a prediction result, ordered by descending confidence
#[derive(Debug, Clone)]
pub struct Prediction {
    pub label: String,
    pub probability: f64,
}

/// Training side of the remote classifier service.
///
/// `upload_image` must tolerate being called many times per tag; `train`
/// blocks until the training iteration has completed and is the default.
pub trait TrainingService {
    fn find_or_create_project(&mut self, name: &str) -> Result<ProjectId, Box<dyn std::error::Error>>;
    fn create_tag(&mut self, project: &ProjectId, name: &str) -> Result<Tag, Box<dyn std::error::Error>>;
    fn upload_image(
        &mut self,
        project: &ProjectId,
        bytes: &[u8],
        tag_ids: &[TagId],
    ) -> Result<(), Box<dyn std::error::Error>>;
    fn train(&mut self, project: &ProjectId) -> Result<(), Box<dyn std::error::Error>>;
}

/// Prediction side of the remote classifier service.
/// The first returned entry is authoritative.
pub trait PredictionService {
    fn predict(
        &mut self,
        project: &ProjectId,
        bytes: &[u8],
    ) -> Result<Vec<Prediction>, Box<dyn std::error::Error>>;
}

/// External resize/crop assist, used while laying out the dataset.
/// Rate limited; callers pace themselves with a `RatePacer`.
pub trait SmartResizeService {
    fn resize(
        &mut self,
        bytes: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error>>;
}

/// Inserts a fixed delay every Nth call to respect a rate-limited service
pub struct RatePacer {
    every: usize,
    delay: Duration,
    calls: usize,
}

impl RatePacer {
    pub fn new(every: usize, delay: Duration) -> Self {
        RatePacer { every, delay, calls: 0 }
    }

    /// Count one call and sleep if it lands on the pacing boundary
    pub fn pace(&mut self) {
        self.calls += 1;
        if self.every > 0 && self.calls % self.every == 0 {
            std::thread::sleep(self.delay);
        }
    }
}

/// Training stand-in that materializes every upload as a file on disk,
/// one subdirectory per tag under the project root. Lets the whole pipeline
/// run offline and leaves the prepared corpus inspectable.
pub struct LocalTrainingService {
    root: PathBuf,
    tag_names: HashMap<String, String>,
    uploads: usize,
}

impl LocalTrainingService {
    pub fn new(root: PathBuf) -> Self {
        LocalTrainingService {
            root,
            tag_names: HashMap::new(),
            uploads: 0,
        }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads
    }
}

impl TrainingService for LocalTrainingService {
    fn find_or_create_project(&mut self, name: &str) -> Result<ProjectId, Box<dyn std::error::Error>> {
        fs::create_dir_all(&self.root)?;
        println!("Using local project directory: {}", self.root.display());
        Ok(ProjectId(name.to_string()))
    }

    fn create_tag(&mut self, _project: &ProjectId, name: &str) -> Result<Tag, Box<dyn std::error::Error>> {
        let id = TagId(name.to_string());
        fs::create_dir_all(self.root.join(name))?;
        self.tag_names.insert(id.0.clone(), name.to_string());
        Ok(Tag { id, name: name.to_string() })
    }

    fn upload_image(
        &mut self,
        _project: &ProjectId,
        bytes: &[u8],
        tag_ids: &[TagId],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let tag_id = tag_ids
            .first()
            .ok_or("upload_image called without a tag")?;
        let dir_name = self
            .tag_names
            .get(&tag_id.0)
            .ok_or_else(|| format!("unknown tag id: {}", tag_id.0))?;

        self.uploads += 1;
        let path = self.root.join(dir_name).join(format!("upload_{:05}.jpg", self.uploads));
        fs::write(path, bytes)?;
        Ok(())
    }

    fn train(&mut self, project: &ProjectId) -> Result<(), Box<dyn std::error::Error>> {
        println!("Local stand-in: no remote training performed for project {}", project.0);
        Ok(())
    }
}

/// Prediction stand-in that guesses uniformly among the known labels.
/// Only useful for exercising the evaluation plumbing offline.
pub struct RandomGuessPredictionService {
    labels: Vec<String>,
    rng: StdRng,
}

impl RandomGuessPredictionService {
    pub fn new(labels: Vec<String>, rng: StdRng) -> Self {
        RandomGuessPredictionService { labels, rng }
    }
}

impl PredictionService for RandomGuessPredictionService {
    fn predict(
        &mut self,
        _project: &ProjectId,
        _bytes: &[u8],
    ) -> Result<Vec<Prediction>, Box<dyn std::error::Error>> {
        if self.labels.is_empty() {
            return Ok(Vec::new());
        }
        let pick = self.rng.gen_range(0..self.labels.len());
        let spread = 1.0 / self.labels.len() as f64;
        // winner first, the rest with a uniform remainder
        let mut predictions = vec![Prediction {
            label: self.labels[pick].clone(),
            probability: spread + (1.0 - spread) * 0.5,
        }];
        for (i, label) in self.labels.iter().enumerate() {
            if i != pick {
                predictions.push(Prediction {
                    label: label.clone(),
                    probability: spread * 0.5,
                });
            }
        }
        Ok(predictions)
    }
}

/// Smart-resize stand-in that resizes locally with linear interpolation
pub struct LocalSmartResizeService {
    jpeg_quality: u8,
}

impl LocalSmartResizeService {
    pub fn new(jpeg_quality: u8) -> Self {
        LocalSmartResizeService { jpeg_quality }
    }
}

impl SmartResizeService for LocalSmartResizeService {
    fn resize(
        &mut self,
        bytes: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let img = image::load_from_memory(bytes)?;
        let resized = img.resize_exact(width, height, FilterType::Triangle);
        Ok(crate::corpus::encode_jpeg(&resized, self.jpeg_quality)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn random_guess_orders_winner_first() {
        let labels = vec!["cat".to_string(), "dog".to_string(), "bird".to_string()];
        let mut service = RandomGuessPredictionService::new(labels.clone(), StdRng::seed_from_u64(1));
        let predictions = service
            .predict(&ProjectId("p".to_string()), &[])
            .unwrap();
        assert_eq!(predictions.len(), 3);
        assert!(labels.contains(&predictions[0].label));
        for later in &predictions[1..] {
            assert!(predictions[0].probability >= later.probability);
        }
    }

    #[test]
    fn random_guess_with_no_labels_returns_empty() {
        let mut service = RandomGuessPredictionService::new(Vec::new(), StdRng::seed_from_u64(1));
        let predictions = service
            .predict(&ProjectId("p".to_string()), &[])
            .unwrap();
        assert!(predictions.is_empty());
    }

    #[test]
    fn pacer_counts_calls_without_delay_when_disabled() {
        let mut pacer = RatePacer::new(0, Duration::from_secs(0));
        for _ in 0..10 {
            pacer.pace();
        }
        assert_eq!(pacer.calls, 10);
    }
}
