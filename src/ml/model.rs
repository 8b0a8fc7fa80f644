use burn::{
    nn::{
        Dropout, DropoutConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::gelu,
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct PoseLifterConfig {
    #[config(default = 17)]
    pub num_joints:  usize,
    /// 3 with a confidence channel, 2 without
    #[config(default = 3)]
    pub in_channels: usize,
    #[config(default = 256)]
    pub hidden_dim:  usize,
    #[config(default = 4)]
    pub depth:       usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
}

impl PoseLifterConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> PoseLifter<B> {
        let embed  = LinearConfig::new(self.num_joints * self.in_channels, self.hidden_dim).init(device);
        let blocks = (0..self.depth).map(|_| self.build_block(device)).collect();
        let head   = LinearConfig::new(self.hidden_dim, self.num_joints * 3).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        PoseLifter { embed, blocks, head, dropout, num_joints: self.num_joints }
    }

    fn build_block<B: Backend>(&self, device: &B::Device) -> ResidualBlock<B> {
        ResidualBlock {
            norm:    LayerNormConfig::new(self.hidden_dim).init(device),
            fc1:     LinearConfig::new(self.hidden_dim, self.hidden_dim * 2).init(device),
            fc2:     LinearConfig::new(self.hidden_dim * 2, self.hidden_dim).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }

    fn embed_matches(&self, other: &Self) -> bool {
        self.num_joints == other.num_joints
            && self.in_channels == other.in_channels
            && self.hidden_dim == other.hidden_dim
    }

    fn head_matches(&self, other: &Self) -> bool {
        self.num_joints == other.num_joints && self.hidden_dim == other.hidden_dim
    }
}

#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    pub norm:    LayerNorm<B>,
    pub fc1:     Linear<B>,
    pub fc2:     Linear<B>,
    pub dropout: Dropout,
}

impl<B: Backend> ResidualBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let h = gelu(self.fc1.forward(self.norm.forward(x.clone())));
        x + self.dropout.forward(self.fc2.forward(h))
    }
}

/// Lifts a clip of 2D joints to 3D, frame by frame.
#[derive(Module, Debug)]
pub struct PoseLifter<B: Backend> {
    pub embed:      Linear<B>,
    pub blocks:     Vec<ResidualBlock<B>>,
    pub head:       Linear<B>,
    pub dropout:    Dropout,
    pub num_joints: usize,
}

/// Which parts of a relaxed load came from the source checkpoint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransplantReport {
    pub loaded:     Vec<String>,
    /// In the target but absent or incompatible in the source
    pub missing:    Vec<String>,
    /// In the source but without a place in the target
    pub unexpected: Vec<String>,
}

impl<B: Backend> PoseLifter<B> {
    /// input: [N, T, J, C] → [N, T, J, 3]
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let [n, t, j, c] = input.dims();
        let x = input.reshape([n, t, j * c]);

        let mut x = self.dropout.forward(gelu(self.embed.forward(x)));
        for block in &self.blocks {
            x = block.forward(x);
        }
        self.head.forward(x).reshape([n, t, self.num_joints, 3])
    }

    /// Copy every compatible part of `source` into `self`.
    ///
    /// Parts whose shapes differ keep their fresh initialisation; extra
    /// source blocks are dropped. This is the tolerant load used when
    /// finetuning from a pretrained backbone.
    pub fn load_relaxed(
        self,
        config:        &PoseLifterConfig,
        source:        PoseLifter<B>,
        source_config: &PoseLifterConfig,
    ) -> (Self, TransplantReport) {
        let mut report = TransplantReport::default();
        let PoseLifter { embed: src_embed, blocks: src_blocks, head: src_head, .. } = source;
        let PoseLifter { mut embed, mut blocks, mut head, dropout, num_joints } = self;

        if config.embed_matches(source_config) {
            embed = src_embed;
            report.loaded.push("embed".into());
        } else {
            report.missing.push("embed".into());
        }

        let blocks_match = config.hidden_dim == source_config.hidden_dim;
        let target_depth = blocks.len();
        for (i, block) in src_blocks.into_iter().enumerate() {
            if blocks_match && i < target_depth {
                blocks[i] = block;
                report.loaded.push(format!("blocks.{i}"));
            } else {
                report.unexpected.push(format!("blocks.{i}"));
            }
        }
        let copied = if blocks_match { source_config.depth.min(target_depth) } else { 0 };
        report.missing.extend((copied..target_depth).map(|i| format!("blocks.{i}")));

        if config.head_matches(source_config) {
            head = src_head;
            report.loaded.push("head".into());
        } else {
            report.missing.push("head".into());
        }

        (PoseLifter { embed, blocks, head, dropout, num_joints }, report)
    }
}
