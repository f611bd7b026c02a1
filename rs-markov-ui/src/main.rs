use std::collections::HashSet;
use std::time::Duration;

use eframe::{egui, Frame};
use egui::Context;

use reqwest::blocking::Client;
use reqwest::Result;

const SERVER: &str = "http://127.0.0.1:5000";

/// REST context holding a reusable blocking HTTP client.
struct RESTContext {
    client: Client,
}

impl RESTContext {
    /// Creates a new REST context with a timeout.
    fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::new(30, 0))
            .build()?;
        Ok(Self { client })
    }

    /// Sends a GET request to `/v1/generate` with query parameters.
    fn get_generated(&self, params: &[(String, String)]) -> Result<String> {
        let response = self.client
            .get(format!("{SERVER}/v1/generate"))
            .query(params)
            .send()?
            .error_for_status()?;

        Ok(response.text()?)
    }

    /// Sends a GET request to `/v1/corpora`.
    fn get_corpora(&self) -> Result<String> {
        let response = self.client
            .get(format!("{SERVER}/v1/corpora"))
            .send()?
            .error_for_status()?;

        Ok(response.text()?)
    }

    /// Sends a GET request to `/v1/trained_corpora`.
    fn get_trained_corpora(&self) -> Result<String> {
        let response = self.client
            .get(format!("{SERVER}/v1/trained_corpora"))
            .send()?
            .error_for_status()?;

        Ok(response.text()?)
    }

    /// Sends a PUT request to `/v1/train` with query parameters.
    fn put_train(&self, params: &[(String, String)]) -> Result<String> {
        let response = self.client
            .put(format!("{SERVER}/v1/train"))
            .query(params)
            .send()?
            .error_for_status()?;

        Ok(response.text()?)
    }
}

/// Global UI state (MUST persist between frames in egui).
struct GeneratorUI {
    rest: RESTContext,
    generated: Vec<String>,
    status: Option<String>,
    available_corpora: Vec<String>,
    selected_corpora: HashSet<String>,

    order: usize,

    prompt: String,
    count: usize,
    k: usize,
    max_len: usize,
    len_penalization: f64,
    reps_penalization: f64,
    initial_eos: f64,
    reduce_k: bool,
}

impl GeneratorUI {
    /// Initializes the UI with the decoder defaults.
    fn new() -> Result<Self> {
        let mut generator = Self {
            rest: RESTContext::new()?,
            generated: Vec::new(),
            status: None,
            available_corpora: Vec::new(),
            selected_corpora: HashSet::new(),

            order: 1,

            prompt: String::new(),
            count: 5,
            k: 3,
            max_len: 10,
            len_penalization: 0.2,
            reps_penalization: 0.2,
            initial_eos: 0.0,
            reduce_k: false,
        };
        generator.get_corpora();
        generator.get_trained_corpora();
        Ok(generator)
    }

    /// Builds the query parameters for `/v1/generate`.
    ///
    /// Every decoder option is sent, the server validates the ranges.
    fn build_generate_query(&self) -> Vec<(String, String)> {
        vec![
            ("prompt".into(), self.prompt.clone()),
            ("count".into(), self.count.to_string()),
            ("k".into(), self.k.to_string()),
            ("max_len".into(), self.max_len.to_string()),
            ("len_penalization".into(), self.len_penalization.to_string()),
            ("reps_penalization".into(), self.reps_penalization.to_string()),
            ("initial_eos".into(), self.initial_eos.to_string()),
            ("reduce_k".into(), self.reduce_k.to_string()),
        ]
    }

    /// Performs the generation request.
    fn get_generated(&mut self) {
        let params = self.build_generate_query();
        match self.rest.get_generated(&params) {
            Ok(lines) => {
                self.generated = lines.lines().map(str::to_owned).collect();
                self.status = None;
            }
            Err(e) => self.status = Some(format!("Error: {e}")),
        }
    }

    /// Performs the get corpora request.
    fn get_corpora(&mut self) {
        match self.rest.get_corpora() {
            Ok(names) => self.available_corpora = split_lines(&names),
            Err(e) => self.status = Some(format!("Error: {e}")),
        }
    }

    /// Performs the get trained corpora request.
    fn get_trained_corpora(&mut self) {
        match self.rest.get_trained_corpora() {
            Ok(names) => self.selected_corpora = split_lines(&names).into_iter().collect(),
            Err(e) => self.status = Some(format!("Error: {e}")),
        }
    }

    /// Performs the training request on the selected corpora.
    fn put_train(&mut self) {
        let mut names = self.selected_corpora.iter().cloned().collect::<Vec<_>>();
        names.sort();
        let params = vec![
            ("names".to_owned(), names.join(",")),
            ("order".to_owned(), self.order.to_string()),
        ];
        match self.rest.put_train(&params) {
            Ok(message) => self.status = Some(message),
            Err(e) => self.status = Some(format!("Error: {e}")),
        }
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

impl eframe::App for GeneratorUI {
    /// UI update loop (called every frame).
    fn update(&mut self, ctx: &Context, _: &mut Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {

            // Corpora used for training
            ui.label("Training corpora");
            for corpus in &self.available_corpora {
                let mut checked = self.selected_corpora.contains(corpus);
                if ui.checkbox(&mut checked, corpus).changed() {
                    if checked {
                        self.selected_corpora.insert(corpus.clone());
                    } else {
                        self.selected_corpora.remove(corpus);
                    }
                }
            }

            ui.horizontal(|ui| {
                ui.label("Chain order");
                ui.add(egui::DragValue::new(&mut self.order).range(1..=10).speed(1));
            });

            let can_train = !self.selected_corpora.is_empty();
            if ui.add_enabled(can_train, egui::Button::new("Train")).clicked() {
                self.put_train();
            }

            ui.separator();

            egui::Grid::new("generator_grid")
                .num_columns(2)
                .spacing([20.0, 6.0])
                .striped(true)
                .show(ui, |ui| {

                    ui.label("Prompt");
                    ui.text_edit_singleline(&mut self.prompt);
                    ui.end_row();

                    ui.label("Count");
                    ui.add(egui::DragValue::new(&mut self.count).range(1..=100).speed(1));
                    ui.end_row();

                    ui.label("k");
                    ui.add(egui::DragValue::new(&mut self.k).range(1..=50).speed(1));
                    ui.end_row();

                    ui.label("Max length");
                    ui.add(egui::DragValue::new(&mut self.max_len).range(1..=200).speed(1));
                    ui.end_row();

                    ui.label("Length penalization");
                    ui.add(egui::DragValue::new(&mut self.len_penalization).range(0.0..=1.0).speed(0.01));
                    ui.end_row();

                    ui.label("Repetition penalization");
                    ui.add(egui::DragValue::new(&mut self.reps_penalization).range(0.0..=1.0).speed(0.01));
                    ui.end_row();

                    ui.label("Initial end-token probability");
                    ui.add(egui::DragValue::new(&mut self.initial_eos).range(0.0..=1.0).speed(0.01));
                    ui.end_row();

                    ui.label("Reduce k while generating");
                    ui.checkbox(&mut self.reduce_k, "");
                    ui.end_row();
                });

            ui.separator();

            if ui
                .add_sized([200.0, 40.0], egui::Button::new("Generate"))
                .clicked()
            {
                self.get_generated();
            }

            if let Some(status) = &self.status {
                ui.label(status);
            } else if self.generated.is_empty() {
                ui.label("Click Generate to start");
            }
            for line in &self.generated {
                ui.label(line);
            }
        });
    }
}

/// Application entry point.
fn main() -> eframe::Result {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([440.0, 560.0])
            .with_resizable(true),
        ..Default::default()
    };

    eframe::run_native(
        "rs-markov",
        options,
        Box::new(|_| Ok(Box::new(GeneratorUI::new()?))),
    )
}
