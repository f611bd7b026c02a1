use std::path::Path;
use std::sync::RwLock;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, put, web};
use log::{info, warn};

use serde::Deserialize;
use rs_markov_core::io::{get_filename, list_files, read_file, working_dir};
use rs_markov_core::{DecoderConfig, MarkovError, Pipeline, PipelineConfig};

const DATA_DIR: &str = "./data";
const CONFIGS_DIR: &str = "./configs";

/// Upper bounds for a single `/v1/generate` request.
const MAX_COUNT: usize = 1000;
const MAX_LEN: usize = 1000;

/// Struct representing query parameters for the `/v1/generate` endpoint
///
/// Every decoder option overrides the value of the trained pipeline
/// for this request only.
#[derive(Deserialize)]
struct GenerateParams {
	prompt: Option<String>,
	count: Option<usize>,
	k: Option<usize>,
	max_len: Option<usize>,
	len_penalization: Option<f64>,
	reps_penalization: Option<f64>,
	initial_eos: Option<f64>,
	reduce_k: Option<bool>,
}

/// Struct representing query parameters for the `/v1/train` endpoint
#[derive(Deserialize)]
struct TrainQuery {
	names: Option<String>,
	config: Option<String>,
	order: Option<usize>,
}

struct SharedData {
	pipeline: Option<Pipeline>,
	corpora: Vec<String>,
}

impl GenerateParams {
	/// Number of sequences to generate, 1 by default.
	fn count(&self) -> Result<usize, MarkovError> {
		let count = self.count.unwrap_or(1);
		if count > MAX_COUNT {
			return Err(MarkovError::InvalidConfig(format!("count must be at most {MAX_COUNT}, got {count}")));
		}
		Ok(count)
	}

	/// Applies the query options on top of `base`.
	fn decoder_config(&self, base: &DecoderConfig) -> Result<DecoderConfig, MarkovError> {
		let config = DecoderConfig {
			strategy: base.strategy,
			k: self.k.unwrap_or(base.k),
			max_len: self.max_len.unwrap_or(base.max_len),
			len_penalization: self.len_penalization.unwrap_or(base.len_penalization),
			reps_penalization: self.reps_penalization.unwrap_or(base.reps_penalization),
			initial_eos: self.initial_eos.unwrap_or(base.initial_eos),
			reduce_k: self.reduce_k.unwrap_or(base.reduce_k),
		};
		config.validate()?;
		if config.max_len > MAX_LEN {
			return Err(MarkovError::InvalidConfig(format!(
				"max_len must be at most {MAX_LEN}, got {}",
				config.max_len
			)));
		}
		Ok(config)
	}
}

/// Splits a comma separated list of corpus names, skipping blanks.
fn corpus_names(names: &str) -> Vec<&str> {
	names.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
}

/// Maps core errors to HTTP responses.
fn error_response(err: MarkovError) -> HttpResponse {
	match err {
		MarkovError::Untrained => HttpResponse::Conflict().body(err.to_string()),
		MarkovError::InvalidConfig(_) | MarkovError::TokenNotFound(_) | MarkovError::Serialization(_) => {
			HttpResponse::BadRequest().body(err.to_string())
		}
		// Missing corpus or configuration file
		MarkovError::Io { .. } => HttpResponse::NotFound().body(err.to_string()),
		_ => HttpResponse::InternalServerError().body(err.to_string()),
	}
}

/// Trains a pipeline on the given corpora, concatenated in order.
fn train_pipeline(names: &[&str], config: Option<&str>, order: Option<usize>) -> Result<Pipeline, MarkovError> {
	let mut config = match config {
		Some(name) => PipelineConfig::from_file(Path::new(CONFIGS_DIR).join(format!("{name}.json")))?,
		None => PipelineConfig::default(),
	};
	if let Some(order) = order {
		config.chain.order = order;
	}

	let mut data = Vec::new();
	for name in names {
		data.extend(read_file(Path::new(DATA_DIR).join(format!("{name}.txt")))?);
	}

	let mut pipeline = Pipeline::new(config)?;
	pipeline.train(&data)?;
	Ok(pipeline)
}

/// HTTP GET endpoint `/v1/generate`
///
/// Generates `count` sequences from the trained pipeline.
/// Returns one generated sequence per line.
#[get("/v1/generate")]
async fn get_generated(data: web::Data<RwLock<SharedData>>, query: web::Query<GenerateParams>) -> impl Responder {
	let prompt = query.prompt.clone().unwrap_or_default();
	let count = match query.count() {
		Ok(count) => count,
		Err(e) => return error_response(e),
	};

	let shared_data = match data.read() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Pipeline lock failed"),
	};
	let pipeline = match &shared_data.pipeline {
		Some(pipeline) => pipeline,
		None => return error_response(MarkovError::Untrained),
	};

	let decoder = match query.decoder_config(&pipeline.config().decoder) {
		Ok(decoder) => decoder,
		Err(e) => return error_response(e),
	};

	match pipeline.generate_with(&prompt, &decoder, count, &mut rand::rng()) {
		Ok(lines) => HttpResponse::Ok().body(lines.join("\n")),
		Err(e) => error_response(e),
	}
}

/// HTTP GET endpoint `/v1/config`
///
/// Returns the configuration of the trained pipeline as JSON.
#[get("/v1/config")]
async fn get_config(data: web::Data<RwLock<SharedData>>) -> impl Responder {
	let shared_data = match data.read() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Pipeline lock failed"),
	};
	match &shared_data.pipeline {
		Some(pipeline) => HttpResponse::Ok().json(pipeline.config()),
		None => error_response(MarkovError::Untrained),
	}
}

#[get("/v1/corpora")]
async fn get_corpora() -> impl Responder {
	match list_files(DATA_DIR, "txt") {
		Ok(files) => {
			let names: Vec<String> = files.iter().filter_map(|file| get_filename(file).ok()).collect();
			HttpResponse::Ok().body(names.join("\n"))
		}
		Err(_) => HttpResponse::InternalServerError().body("Failed to list corpora"),
	}
}

#[get("/v1/trained_corpora")]
async fn get_trained_corpora(data: web::Data<RwLock<SharedData>>) -> impl Responder {
	let shared_data = match data.read() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Pipeline lock failed"),
	};
	HttpResponse::Ok().body(shared_data.corpora.join("\n"))
}

#[put("/v1/train")]
async fn put_train(data: web::Data<RwLock<SharedData>>, query: web::Query<TrainQuery>) -> impl Responder {
	let corpus_names = corpus_names(query.names.as_deref().unwrap_or_default());
	if corpus_names.is_empty() {
		return HttpResponse::BadRequest().body("Missing or empty corpus name");
	}

	// Train outside the lock, generation keeps working meanwhile.
	let pipeline = match train_pipeline(&corpus_names, query.config.as_deref(), query.order) {
		Ok(pipeline) => pipeline,
		Err(e) => {
			warn!("training on {corpus_names:?} failed: {e}");
			return error_response(e);
		}
	};

	let mut shared_data = match data.write() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Pipeline lock failed"),
	};
	shared_data.pipeline = Some(pipeline);
	shared_data.corpora = corpus_names.iter().map(|name| (*name).to_owned()).collect();
	info!("pipeline trained on {:?}", shared_data.corpora);

	HttpResponse::Ok().body("Pipeline trained successfully")
}

/// Main entry point for the server.
///
/// Starts without a trained pipeline, wraps the shared state in a `RwLock`
/// (generation only reads the chain) and starts an Actix-web HTTP server.
///
/// # Notes
/// - The server binds to 127.0.0.1:5000.
/// - Corpora are read from `./data/*.txt`, configurations from `./configs/*.json`.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
	info!("serving corpora from {}", working_dir().join(DATA_DIR).display());

	let shared_data = SharedData {
		pipeline: None,
		corpora: Vec::new(),
	};
	let shared_pipeline = web::Data::new(RwLock::new(shared_data));

	HttpServer::new(move || {
		let cors = Cors::default()
			.allow_any_origin()
			.allowed_methods(vec!["GET", "PUT"])
			.max_age(3600);

		App::new()
			.wrap(cors)
			.wrap(Logger::default())
			.app_data(shared_pipeline.clone())
			.service(get_generated)
			.service(get_config)
			.service(get_corpora)
			.service(put_train)
			.service(get_trained_corpora)
	})
		.bind(("127.0.0.1", 5000))?
		.run()
		.await
}

#[cfg(test)]
mod tests {
	use actix_web::http::StatusCode;

	use super::*;

	fn params() -> GenerateParams {
		GenerateParams {
			prompt: None,
			count: None,
			k: None,
			max_len: None,
			len_penalization: None,
			reps_penalization: None,
			initial_eos: None,
			reduce_k: None,
		}
	}

	#[test]
	fn query_options_override_the_pipeline_decoder() {
		let base = DecoderConfig::default();
		assert_eq!(params().decoder_config(&base).unwrap(), base);

		let query = GenerateParams {
			k: Some(1),
			max_len: Some(20),
			reduce_k: Some(true),
			..params()
		};
		let config = query.decoder_config(&base).unwrap();
		assert_eq!(config.k, 1);
		assert_eq!(config.max_len, 20);
		assert!(config.reduce_k);
		assert_eq!(config.len_penalization, base.len_penalization);
	}

	#[test]
	fn out_of_range_options_are_rejected() {
		let base = DecoderConfig::default();
		for query in [
			GenerateParams { k: Some(0), ..params() },
			GenerateParams { reps_penalization: Some(1.5), ..params() },
			GenerateParams { max_len: Some(MAX_LEN + 1), ..params() },
		] {
			assert!(matches!(query.decoder_config(&base), Err(MarkovError::InvalidConfig(_))));
		}

		assert_eq!(params().count().unwrap(), 1);
		assert_eq!(GenerateParams { count: Some(MAX_COUNT), ..params() }.count().unwrap(), MAX_COUNT);
		assert!(GenerateParams { count: Some(MAX_COUNT + 1), ..params() }.count().is_err());
	}

	#[test]
	fn blank_corpus_names_are_skipped() {
		assert_eq!(corpus_names(" names , ,pets,"), ["names", "pets"]);
		assert!(corpus_names(",").is_empty());
		assert!(corpus_names("").is_empty());
	}

	#[test]
	fn errors_map_to_status_codes() {
		let io = MarkovError::io(std::io::Error::from(std::io::ErrorKind::NotFound), None);
		let cases = [
			(MarkovError::Untrained, StatusCode::CONFLICT),
			(MarkovError::InvalidConfig("k".into()), StatusCode::BAD_REQUEST),
			(MarkovError::TokenNotFound("7".into()), StatusCode::BAD_REQUEST),
			(MarkovError::Serialization("eof".into()), StatusCode::BAD_REQUEST),
			(io, StatusCode::NOT_FOUND),
			(MarkovError::UnknownId(99), StatusCode::INTERNAL_SERVER_ERROR),
		];
		for (err, status) in cases {
			assert_eq!(error_response(err).status(), status);
		}
	}
}
