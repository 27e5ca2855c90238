//! End-to-end runs on a small synthetic dataset.

use candle_core::Device;
use candle_nn::VarMap;
use std::fs;
use std::path::Path;
use topica_core::hetero::{EdgeStore, HeteroGraph, NodeFeatures, NodeStore};
use topica_core::{dataset, schema};
use topica_nn::{Adam, EncoderConfig};
use topica_train::checkpoint::{CheckpointMeta, Checkpointer, MODEL_FILE, META_FILE, OPTIMIZER_FILE};
use topica_train::config::{ExperimentConfig, RunConfig, TrainingConfig};
use topica_train::run::{RunDirectory, HISTORY_FILE, INFO_FILE};
use topica_train::trainer::Trainer;
use topica_train::{pipeline, Error};

const AUTHORS: usize = 20;
const PAPERS: usize = 30;
const TOPICS: usize = 4;

// Author a writes papers a and a+7; paper p is from 2017 + p % 3 and is
// about topics p % 4 and (p + 1) % 4.
fn synthetic_graph() -> HeteroGraph {
    let mut hg = HeteroGraph::new();
    hg.add_node_type(
        schema::author(),
        NodeStore::new(AUTHORS).with_fold((0..AUTHORS).map(|a| (a % 5) as u8).collect()),
    );
    hg.add_node_type(
        schema::paper(),
        NodeStore::new(PAPERS)
            .with_year((0..PAPERS).map(|p| 2017 + (p % 3) as u16).collect())
            .with_features(NodeFeatures::Int {
                cols: 2,
                data: (0..PAPERS as i64).flat_map(|p| [p % 2, p % 5]).collect(),
            }),
    );
    hg.add_node_type(schema::topic(), NodeStore::new(TOPICS));

    let writes = (0..AUTHORS).flat_map(|a| [(a, a), (a, (a + 7) % PAPERS)]);
    let cites = (0..PAPERS).map(|p| (p, (p + 3) % PAPERS));
    let about = (0..PAPERS).flat_map(|p| [(p, p % TOPICS), (p, (p + 1) % TOPICS)]);
    hg.insert_edges(schema::writes(), EdgeStore::from_pairs(writes).coalesced());
    hg.insert_edges(schema::cites(), EdgeStore::from_pairs(cites).coalesced());
    hg.insert_edges(schema::about(), EdgeStore::from_pairs(about).coalesced());
    hg
}

fn setup(root: &Path) -> (RunConfig, ExperimentConfig) {
    dataset::save_graph(root.join("data"), &synthetic_graph()).unwrap();
    let run = RunConfig {
        learning_rate: 0.01,
        use_infosphere: false,
        infosphere_depth: 0,
        only_new: false,
    };
    let exp = ExperimentConfig::default()
        .with_root(root.join("data"))
        .with_models_dir(root.join("models"))
        .with_run_name("tiny")
        .with_year(2018)
        .with_batch_size(8)
        .with_fanout(vec![4, 2])
        .with_cpu(true);
    (run, exp)
}

fn small_encoder() -> EncoderConfig {
    EncoderConfig::default().with_hidden(8).with_heads(2).with_embedding_dim(8)
}

/// Records every save instead of touching disk.
#[derive(Default)]
struct Recording {
    saved: Vec<CheckpointMeta>,
}

impl Checkpointer for Recording {
    fn save(&mut self, _: &VarMap, _: &Adam, meta: &CheckpointMeta) -> topica_train::Result<()> {
        self.saved.push(meta.clone());
        Ok(())
    }
}

#[test]
fn test_fit_writes_run_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let (run, exp) = setup(tmp.path());

    let mut data = pipeline::prepare(&run, &exp).unwrap();
    assert!(data.train_loader.num_labels() > 0);
    assert!(data.val_loader.num_labels() > 0);

    let mut dir = RunDirectory::create(&exp.models_dir, &exp.run_name, &run).unwrap();
    let mut ckpt = dir.checkpointer();
    let mut trainer = Trainer::new(
        &data.metadata,
        data.target.clone(),
        &small_encoder(),
        run.learning_rate,
        TrainingConfig::default().with_max_epochs(3).with_patience(5),
        Device::Cpu,
    )
    .unwrap();
    let result = trainer
        .fit(&mut data.train_loader, &mut data.val_loader, &mut ckpt, &mut dir)
        .unwrap();

    assert_eq!(result.epochs_run, 3);
    assert!(!result.stopped_early);
    assert_eq!(result.history.len(), 3);
    assert_eq!(result.best_epoch.map(|e| e >= 1), Some(true));
    assert!(result.best_val_loss.is_finite());
    assert!(trainer.optimizer().step_count() > 0);

    for file in [INFO_FILE, HISTORY_FILE, MODEL_FILE, OPTIMIZER_FILE, META_FILE] {
        assert!(dir.path().join(file).exists(), "missing {file}");
    }
    let info: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join(INFO_FILE)).unwrap()).unwrap();
    assert_eq!(info["lr"], 0.01);
    assert_eq!(info["data"].as_array().unwrap().len(), 3);

    let val = &result.history.confusion_val;
    assert_eq!(val.total(), data.val_loader.num_labels());
}

#[test]
fn test_checkpoints_follow_improvements() {
    let tmp = tempfile::tempdir().unwrap();
    let (run, exp) = setup(tmp.path());
    let mut data = pipeline::prepare(&run, &exp).unwrap();

    let mut dir = RunDirectory::create(&exp.models_dir, "patience", &run).unwrap();
    let mut ckpt = Recording::default();
    let patience = 1;
    let mut trainer = Trainer::new(
        &data.metadata,
        data.target.clone(),
        &small_encoder(),
        run.learning_rate,
        TrainingConfig::default().with_max_epochs(6).with_patience(patience),
        Device::Cpu,
    )
    .unwrap();
    let result = trainer
        .fit(&mut data.train_loader, &mut data.val_loader, &mut ckpt, &mut dir)
        .unwrap();

    let records = &dir.manifest().data;
    assert_eq!(records.len(), result.epochs_run);
    assert!(records[0].improved);

    let improved: Vec<usize> = records.iter().filter(|r| r.improved).map(|r| r.epoch).collect();
    let saved: Vec<usize> = ckpt.saved.iter().map(|m| m.epoch).collect();
    assert_eq!(improved, saved);
    assert_eq!(result.best_epoch, saved.last().copied());

    // saved losses strictly decrease
    for pair in ckpt.saved.windows(2) {
        assert!(pair[1].val_loss < pair[0].val_loss);
    }

    if result.stopped_early {
        let last = records.last().unwrap();
        assert!(!last.improved);
        assert_eq!(last.counter, patience);
    } else {
        assert_eq!(result.epochs_run, 6);
    }
}

#[test]
fn test_only_new_targets_are_cached() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut run, exp) = setup(tmp.path());
    run.only_new = true;

    let first = pipeline::prepare(&run, &exp).unwrap();
    let cache = topica_core::target::cache_path(
        &exp.root,
        run.target_mode().target_year(exp.year),
        run.target_mode(),
    );
    assert!(cache.ends_with("difference_next_topic_edge2018.bin"));
    assert!(cache.exists());

    // second run reads the cache and sees the same labels
    let second = pipeline::prepare(&run, &exp).unwrap();
    assert_eq!(first.train_loader.num_labels(), second.train_loader.num_labels());
    assert_eq!(first.val_loader.num_labels(), second.val_loader.num_labels());
}

#[test]
fn test_missing_infosphere_is_error() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut run, exp) = setup(tmp.path());
    run.use_infosphere = true;
    run.infosphere_depth = 2;

    let err = pipeline::prepare(&run, &exp).err().unwrap();
    assert!(matches!(
        err,
        Error::Data(topica_core::Error::MissingInfosphere { .. })
    ));
}

#[test]
fn test_missing_dataset_is_error() {
    let tmp = tempfile::tempdir().unwrap();
    let run = RunConfig {
        learning_rate: 0.01,
        use_infosphere: false,
        infosphere_depth: 0,
        only_new: false,
    };
    let exp = ExperimentConfig::default().with_root(tmp.path().join("nowhere"));
    assert!(pipeline::prepare(&run, &exp).is_err());
}
