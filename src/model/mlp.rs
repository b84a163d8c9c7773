//! Dense shallow-deep network with growable IC heads
//!
//! The backbone is a stack of `Linear + ReLU` blocks of equal width. An IC
//! head reads the output of every block except the deepest one, and the
//! final head reads the deepest block. Growing the network appends a block
//! and attaches a new IC head where the final head used to read, so the
//! final head moves one block deeper and keeps its shape.

use super::{Mode, ModelFlags, Param, ParamId, SdnModel};
use crate::{Error, Result};
use ndarray::{Array2, Axis, Zip};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Architecture of an [`MlpSdn`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpSdnConfig {
    pub input_dim: usize,
    pub hidden_dim: usize,
    pub num_classes: usize,
    /// Maximum number of IC heads; the full network has `num_ics + 1` blocks.
    pub num_ics: usize,
    /// Heads present at construction (`1` = start shallow and grow).
    pub initial_heads: usize,
    pub seed: u64,
    pub flags: ModelFlags,
}

impl Default for MlpSdnConfig {
    fn default() -> Self {
        Self {
            input_dim: 16,
            hidden_dim: 32,
            num_classes: 3,
            num_ics: 3,
            initial_heads: 1,
            seed: 42,
            flags: ModelFlags::default(),
        }
    }
}

impl MlpSdnConfig {
    pub fn new(input_dim: usize, hidden_dim: usize, num_classes: usize, num_ics: usize) -> Self {
        Self {
            input_dim,
            hidden_dim,
            num_classes,
            num_ics,
            ..Self::default()
        }
    }

    pub fn with_initial_heads(mut self, heads: usize) -> Self {
        self.initial_heads = heads;
        self
    }

    /// Start with every IC head already attached.
    pub fn full_depth(mut self) -> Self {
        self.initial_heads = self.num_ics + 1;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_flags(mut self, flags: ModelFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_pruning(mut self, keep_ratio: f32) -> Self {
        self.flags.prune = true;
        self.flags.keep_ratio = keep_ratio;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_dim == 0 || self.hidden_dim == 0 {
            return Err(Error::config("input_dim and hidden_dim must be non-zero"));
        }
        if self.num_classes == 0 {
            return Err(Error::config("num_classes must be non-zero"));
        }
        if self.initial_heads == 0 || self.initial_heads > self.num_ics + 1 {
            return Err(Error::config(format!(
                "initial_heads ({}) must be between 1 and num_ics + 1 ({})",
                self.initial_heads,
                self.num_ics + 1
            )));
        }
        if !(self.flags.keep_ratio > 0.0 && self.flags.keep_ratio <= 1.0) {
            return Err(Error::config(format!(
                "keep_ratio ({}) must be in (0, 1]",
                self.flags.keep_ratio
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Dense {
    weight: Param,
    bias: Param,
}

impl Dense {
    fn new(
        next_id: &mut usize,
        fan_in: usize,
        fan_out: usize,
        rng: &mut StdRng,
        prunable: bool,
    ) -> Self {
        let bound = init_bound(fan_in);
        let weight = Array2::from_shape_fn((fan_in, fan_out), |_| rng.random_range(-bound..bound));
        let bias = Array2::from_shape_fn((1, fan_out), |_| rng.random_range(-bound..bound));
        let weight_id = ParamId(*next_id);
        let bias_id = ParamId(*next_id + 1);
        *next_id += 2;
        Self {
            weight: Param::new(weight_id, weight, prunable),
            bias: Param::new(bias_id, bias, false),
        }
    }

    fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        input.dot(self.weight.value()) + self.bias.value()
    }

    /// Accumulate parameter gradients and return `dL/dinput`.
    fn backward(&mut self, input: &Array2<f32>, grad_out: &Array2<f32>) -> Result<Array2<f32>> {
        self.weight.accumulate_grad(&input.t().dot(grad_out))?;
        self.bias
            .accumulate_grad(&grad_out.sum_axis(Axis(0)).insert_axis(Axis(0)))?;
        Ok(grad_out.dot(&self.weight.value().t()))
    }

    fn ids(&self) -> [ParamId; 2] {
        [self.weight.id(), self.bias.id()]
    }
}

fn init_bound(fan_in: usize) -> f32 {
    1.0 / (fan_in.max(1) as f32).sqrt()
}

#[derive(Debug, Clone)]
struct ForwardCache {
    inputs: Array2<f32>,
    pre_activations: Vec<Array2<f32>>,
    activations: Vec<Array2<f32>>,
}

/// Owned copy of every parameter of an [`MlpSdn`], masks included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpSdnState {
    config: MlpSdnConfig,
    blocks: Vec<Dense>,
    ic_heads: Vec<Dense>,
    final_head: Dense,
    next_id: usize,
}

impl MlpSdnState {
    pub fn num_output(&self) -> usize {
        self.blocks.len()
    }

    pub fn config(&self) -> &MlpSdnConfig {
        &self.config
    }
}

/// Dense SDN implementing [`SdnModel`].
#[derive(Debug, Clone)]
pub struct MlpSdn {
    config: MlpSdnConfig,
    blocks: Vec<Dense>,
    ic_heads: Vec<Dense>,
    final_head: Dense,
    next_id: usize,
    mode: Mode,
    rng: StdRng,
    cache: Option<ForwardCache>,
}

impl MlpSdn {
    pub fn new(config: MlpSdnConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut next_id = 0;
        let first = Dense::new(
            &mut next_id,
            config.input_dim,
            config.hidden_dim,
            &mut rng,
            true,
        );
        let final_head = Dense::new(
            &mut next_id,
            config.hidden_dim,
            config.num_classes,
            &mut rng,
            false,
        );
        let mut model = Self {
            blocks: vec![first],
            ic_heads: Vec::new(),
            final_head,
            next_id,
            mode: Mode::Train,
            rng,
            cache: None,
            config,
        };
        for _ in 1..model.config.initial_heads {
            model.add_depth();
        }
        Ok(model)
    }

    pub fn config(&self) -> &MlpSdnConfig {
        &self.config
    }

    pub fn num_classes(&self) -> usize {
        self.config.num_classes
    }

    /// Attach an IC head at the current deepest block and append a new
    /// block behind it. Returns the ids of `(head, block)`.
    fn add_depth(&mut self) -> ([ParamId; 2], [ParamId; 2]) {
        let hidden = self.config.hidden_dim;
        let head = Dense::new(
            &mut self.next_id,
            hidden,
            self.config.num_classes,
            &mut self.rng,
            false,
        );
        let block = Dense::new(&mut self.next_id, hidden, hidden, &mut self.rng, true);
        let ids = (head.ids(), block.ids());
        self.ic_heads.push(head);
        self.blocks.push(block);
        ids
    }
}

impl SdnModel for MlpSdn {
    type Snapshot = MlpSdnState;

    fn num_output(&self) -> usize {
        self.blocks.len()
    }

    fn num_ics(&self) -> usize {
        self.config.num_ics
    }

    fn flags(&self) -> &ModelFlags {
        &self.config.flags
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn set_mode(&mut self, mode: Mode) {
        if mode == Mode::Eval {
            self.cache = None;
        }
        self.mode = mode;
    }

    fn forward(&mut self, inputs: &Array2<f32>) -> Result<Vec<Array2<f32>>> {
        if inputs.ncols() != self.config.input_dim {
            return Err(Error::ShapeMismatch {
                context: "model input".into(),
                expected: vec![inputs.nrows(), self.config.input_dim],
                actual: inputs.shape().to_vec(),
            });
        }

        let mut pre_activations = Vec::with_capacity(self.blocks.len());
        let mut activations: Vec<Array2<f32>> = Vec::with_capacity(self.blocks.len());
        for (i, block) in self.blocks.iter().enumerate() {
            let input = if i == 0 { inputs } else { &activations[i - 1] };
            let z = block.forward(input);
            let a = z.mapv(|v| v.max(0.0));
            pre_activations.push(z);
            activations.push(a);
        }

        let mut outputs: Vec<Array2<f32>> = self
            .ic_heads
            .iter()
            .zip(&activations)
            .map(|(head, act)| head.forward(act))
            .collect();
        let deepest = activations
            .last()
            .ok_or_else(|| Error::config("model has no blocks"))?;
        outputs.push(self.final_head.forward(deepest));

        self.cache = match self.mode {
            Mode::Train => Some(ForwardCache {
                inputs: inputs.clone(),
                pre_activations,
                activations,
            }),
            Mode::Eval => None,
        };
        Ok(outputs)
    }

    fn backward(&mut self, grad_outputs: &[Array2<f32>]) -> Result<()> {
        let depth = self.blocks.len();
        if grad_outputs.len() != depth {
            return Err(Error::ShapeMismatch {
                context: "head gradients".into(),
                expected: vec![depth],
                actual: vec![grad_outputs.len()],
            });
        }
        let cache = self.cache.take().ok_or(Error::NotTraining)?;

        let mut upstream: Option<Array2<f32>> = None;
        for i in (0..depth).rev() {
            let head = if i + 1 == depth {
                &mut self.final_head
            } else {
                &mut self.ic_heads[i]
            };
            let mut grad = head.backward(&cache.activations[i], &grad_outputs[i])?;
            if let Some(up) = upstream.take() {
                grad += &up;
            }
            Zip::from(&mut grad)
                .and(&cache.pre_activations[i])
                .for_each(|g, &z| {
                    if z <= 0.0 {
                        *g = 0.0;
                    }
                });
            let input = if i == 0 {
                &cache.inputs
            } else {
                &cache.activations[i - 1]
            };
            upstream = Some(self.blocks[i].backward(input, &grad)?);
        }
        Ok(())
    }

    fn grow(&mut self) -> Result<Vec<ParamId>> {
        if self.is_full_depth() {
            return Err(Error::GrowthExhausted {
                num_output: self.num_output(),
                max: self.config.num_ics + 1,
            });
        }
        let (head, block) = self.add_depth();
        self.cache = None;
        debug!(num_output = self.num_output(), "added IC head and block");

        let mut new_params = head.to_vec();
        if !self.config.flags.ic_only {
            new_params.extend(block);
        }
        Ok(new_params)
    }

    fn trainable_params(&self) -> Vec<ParamId> {
        if self.config.flags.ic_only {
            self.ic_heads.iter().flat_map(Dense::ids).collect()
        } else {
            self.params().into_iter().map(Param::id).collect()
        }
    }

    fn params(&self) -> Vec<&Param> {
        self.blocks
            .iter()
            .chain(&self.ic_heads)
            .chain(std::iter::once(&self.final_head))
            .flat_map(|d| [&d.weight, &d.bias])
            .collect()
    }

    fn params_mut(&mut self) -> Vec<&mut Param> {
        self.blocks
            .iter_mut()
            .chain(self.ic_heads.iter_mut())
            .chain(std::iter::once(&mut self.final_head))
            .flat_map(|d| [&mut d.weight, &mut d.bias])
            .collect()
    }

    fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    fn block_params(&self, block: usize) -> Result<Vec<ParamId>> {
        self.blocks
            .get(block)
            .map(|d| vec![d.weight.id()])
            .ok_or(Error::InvalidBlock {
                block,
                available: self.blocks.len(),
            })
    }

    fn reinitialize(&mut self, params: &[ParamId]) -> Result<()> {
        for &id in params {
            let (rows, cols) = self
                .params()
                .into_iter()
                .find(|p| p.id() == id)
                .map(|p| p.value().dim())
                .ok_or(Error::UnknownParam(id.0))?;
            let bound = init_bound(rows);
            let fresh: Vec<f32> = (0..rows * cols)
                .map(|_| self.rng.random_range(-bound..bound))
                .collect();
            let param = self.param_mut(id).ok_or(Error::UnknownParam(id.0))?;
            let mut values = fresh.into_iter();
            param.reinitialize(|| values.next().unwrap_or(0.0));
        }
        Ok(())
    }

    fn snapshot(&self) -> MlpSdnState {
        MlpSdnState {
            config: self.config.clone(),
            blocks: self.blocks.clone(),
            ic_heads: self.ic_heads.clone(),
            final_head: self.final_head.clone(),
            next_id: self.next_id,
        }
    }

    fn from_snapshot(snapshot: &MlpSdnState) -> Result<Self> {
        if snapshot.ic_heads.len() + 1 != snapshot.blocks.len() {
            return Err(Error::ShapeMismatch {
                context: "snapshot heads per block".into(),
                expected: vec![snapshot.blocks.len().saturating_sub(1)],
                actual: vec![snapshot.ic_heads.len()],
            });
        }
        Ok(Self {
            config: snapshot.config.clone(),
            blocks: snapshot.blocks.clone(),
            ic_heads: snapshot.ic_heads.clone(),
            final_head: snapshot.final_head.clone(),
            next_id: snapshot.next_id,
            mode: Mode::Eval,
            rng: StdRng::seed_from_u64(snapshot.config.seed ^ snapshot.next_id as u64),
            cache: None,
        })
    }
}
