use serde_json::json;

use crate::hmm::structs::{Label, ProbTable};
use crate::hmm::Smoothing;
use crate::rbm::Matrix;

pub type JsonVec = Vec<serde_json::Value>;

impl<S: Label> ProbTable<S> {
    /// One JSON cell per (time, state) pair, for plotting as a heatmap.
    pub fn json(&self, id: &str) -> JsonVec {
        let mut cells: JsonVec = vec![];
        for (time, row) in self.iter().enumerate() {
            for (state_idx, (state, prob)) in row.iter().enumerate() {
                cells.push(json!({
                    "id": format!("{}-{}-{}", id, time, state_idx),
                    "time": time,
                    "state": format!("{:?}", state),
                    "prob": prob,
                }));
            }
        }
        cells
    }
}

impl<S: Label> Smoothing<S> {
    pub fn json(&self) -> serde_json::Value {
        json!({
            "logLikelihood": self.log_likelihood.value(),
            "forward": self.forward.json("forward"),
            "backward": self.backward.json("backward"),
            "posterior": self.posterior.json("posterior"),
        })
    }
}

impl Matrix {
    pub fn json(&self, id: &str) -> JsonVec {
        let mut cells: JsonVec = vec![];
        for row_idx in 0..self.num_rows {
            for (col_idx, value) in self.row(row_idx).iter().enumerate() {
                cells.push(json!({
                    "id": format!("{}-{}-{}", id, row_idx, col_idx),
                    "row": row_idx,
                    "col": col_idx,
                    "value": value,
                }));
            }
        }
        cells
    }
}

#[cfg(test)]
mod tests {
    use crate::hmm::test_models::fever;
    use crate::rbm::Matrix;
    use assert2::{assert, check};

    #[test]
    fn test_smoothing_json() -> anyhow::Result<()> {
        let smoothing = fever().fwd_bwd(&["normal", "dizzy"])?;
        let value = smoothing.json();

        let posterior = value["posterior"].as_array().unwrap();
        // 3 time steps, 2 states
        assert!(posterior.len() == 6);
        assert!(posterior[3]["id"] == "posterior-1-1");
        assert!(posterior[3]["state"] == "\"Fever\"");
        check!(value["forward"].as_array().unwrap().len() == 6);
        check!(value["logLikelihood"].as_f64().unwrap() < 0.0);

        let prob = posterior[3]["prob"].as_f64().unwrap();
        check!((prob - smoothing.posterior.prob(1, &"Fever")?).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_matrix_json() {
        let matrix = Matrix::from_fn(2, 2, |r, c| (r * 2 + c) as f64);
        let cells = matrix.json("weights");
        assert!(cells.len() == 4);
        assert!(cells[2]["id"] == "weights-1-0");
        assert!(cells[2]["value"] == 2.0);
    }
}
