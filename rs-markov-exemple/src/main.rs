use std::path::Path;

use rs_markov_core::{MarkovError, Pipeline, PipelineConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Load the configuration if one exists, defaults otherwise
    // (char tokenizer, order 1, top-k decoder with k = 3)
    let config_path = Path::new("./configs/default.json");
    let mut config = if config_path.exists() {
        PipelineConfig::from_file(config_path)?
    } else {
        PipelineConfig::default()
    };

    // Number of preceding characters a prediction depends on
    config.chain.order = 2;

    // Number of most probable candidates sampled from at each step
    config.decoder.k = 3;

    // Generation stops when this length is reached,
    // 'len_penalization' makes the end token likelier as it gets close
    config.decoder.max_len = 12;
    config.decoder.len_penalization = 0.3;

    // Lower the probability of repeating the previous character
    config.decoder.reps_penalization = 0.2;

    // Reduce k as the sequence grows (results get greedier)
    config.decoder.reduce_k = true;

    // Penalizations must be between 0.0 and 1.0
    let mut invalid = config.clone();
    invalid.decoder.reps_penalization = 2.0;
    match Pipeline::new(invalid) {
        Ok(_) => println!("Should not happen"),
        Err(MarkovError::InvalidConfig(e)) => println!("Invalid configuration: {e}"),
        Err(e) => return Err(e.into()),
    }

    // Train on the corpus named in the configuration ("names.txt" by default)
    let data = config.data.clone().unwrap_or_else(|| "names.txt".to_owned());
    let mut app = Pipeline::new(config)?;
    app.train_from_file(Path::new("./data").join(data))?;

    let vocabulary = app.chain().map(|chain| chain.vocabulary().size()).transpose()?;
    println!("Vocabulary size: {}", vocabulary.unwrap_or_default());

    // A prompt with characters the corpus does not contain is rejected
    match app.generate("r2d2") {
        Ok(_) => println!("Should not happen"),
        Err(e) => println!("Prompt 'r2d2' rejected: {e}"),
    }

    // Generate 10 names with no prompt, then 5 starting with "ma"
    for (i, name) in app.generate_many("", 10)?.iter().enumerate() {
        println!("Generated name {}: {}", i + 1, name);
    }
    for (i, name) in app.generate_many("ma", 5)?.iter().enumerate() {
        println!("Generated 'ma' name {}: {}", i + 1, name);
    }

    Ok(())
}
