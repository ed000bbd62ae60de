use anyhow::{Result, anyhow};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::preprocess::Normalization;

const DETECTION_NORMALIZATION: Normalization = Normalization {
    mean: [0.798, 0.785, 0.772],
    std: [0.264, 0.2749, 0.287],
};

const RECOGNITION_NORMALIZATION: Normalization = Normalization {
    mean: [0.694, 0.695, 0.693],
    std: [0.299, 0.296, 0.301],
};

/// Supported text detection architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, EnumIter)]
pub enum DetectionArch {
    #[strum(serialize = "db_resnet34")]
    DbResnet34,

    #[strum(serialize = "db_resnet50")]
    DbResnet50,

    #[strum(serialize = "db_mobilenet_v3_large")]
    DbMobilenetV3Large,

    #[strum(serialize = "linknet_resnet18")]
    LinknetResnet18,

    #[strum(serialize = "linknet_resnet34")]
    LinknetResnet34,

    #[strum(serialize = "linknet_resnet50")]
    LinknetResnet50,
}

/// Supported text recognition architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, EnumIter)]
pub enum RecognitionArch {
    #[strum(serialize = "crnn_vgg16_bn")]
    CrnnVgg16Bn,

    #[strum(serialize = "crnn_mobilenet_v3_small")]
    CrnnMobilenetV3Small,

    #[strum(serialize = "crnn_mobilenet_v3_large")]
    CrnnMobilenetV3Large,

    #[strum(serialize = "sar_resnet31")]
    SarResnet31,

    #[strum(serialize = "master")]
    Master,

    #[strum(serialize = "vitstr_small")]
    VitstrSmall,

    #[strum(serialize = "vitstr_base")]
    VitstrBase,

    #[strum(serialize = "parseq")]
    Parseq,
}

/// How a recognition head turns logits into characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoding {
    /// Per-step classes with a trailing blank, repeats collapsed.
    Ctc,
    /// One class per position, terminated by the end-of-sequence index.
    Attention,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct DetectionSpec {
    pub repo: &'static str,
    pub normalization: Normalization,
    /// (height, width)
    pub input_size: (u32, u32),
    pub bin_thresh: f32,
    pub box_thresh: f32,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RecognitionSpec {
    pub repo: &'static str,
    pub normalization: Normalization,
    /// (height, width)
    pub input_size: (u32, u32),
    pub decoding: Decoding,
}

impl DetectionArch {
    pub fn from_name(name: &str) -> Result<Self> {
        name.parse().map_err(|_| {
            anyhow!(
                "unsupported detection architecture `{name}`, expected one of: {}",
                supported::<Self>()
            )
        })
    }

    pub(crate) const fn spec(&self) -> DetectionSpec {
        let (repo, bin_thresh) = match self {
            DetectionArch::DbResnet34 => ("Felix92/onnxtr-db-resnet34", 0.3),
            DetectionArch::DbResnet50 => ("Felix92/onnxtr-db-resnet50", 0.3),
            DetectionArch::DbMobilenetV3Large => ("Felix92/onnxtr-db-mobilenet-v3-large", 0.3),
            DetectionArch::LinknetResnet18 => ("Felix92/onnxtr-linknet-resnet18", 0.1),
            DetectionArch::LinknetResnet34 => ("Felix92/onnxtr-linknet-resnet34", 0.1),
            DetectionArch::LinknetResnet50 => ("Felix92/onnxtr-linknet-resnet50", 0.1),
        };

        DetectionSpec {
            repo,
            normalization: DETECTION_NORMALIZATION,
            input_size: (1024, 1024),
            bin_thresh,
            box_thresh: 0.1,
        }
    }
}

impl RecognitionArch {
    pub fn from_name(name: &str) -> Result<Self> {
        name.parse().map_err(|_| {
            anyhow!(
                "unsupported recognition architecture `{name}`, expected one of: {}",
                supported::<Self>()
            )
        })
    }

    pub const fn decoding(&self) -> Decoding {
        match self {
            RecognitionArch::CrnnVgg16Bn
            | RecognitionArch::CrnnMobilenetV3Small
            | RecognitionArch::CrnnMobilenetV3Large => Decoding::Ctc,
            _ => Decoding::Attention,
        }
    }

    pub(crate) const fn spec(&self) -> RecognitionSpec {
        let repo = match self {
            RecognitionArch::CrnnVgg16Bn => "Felix92/onnxtr-crnn-vgg16-bn",
            RecognitionArch::CrnnMobilenetV3Small => "Felix92/onnxtr-crnn-mobilenet-v3-small",
            RecognitionArch::CrnnMobilenetV3Large => "Felix92/onnxtr-crnn-mobilenet-v3-large",
            RecognitionArch::SarResnet31 => "Felix92/onnxtr-sar-resnet31",
            RecognitionArch::Master => "Felix92/onnxtr-master",
            RecognitionArch::VitstrSmall => "Felix92/onnxtr-vitstr-small",
            RecognitionArch::VitstrBase => "Felix92/onnxtr-vitstr-base",
            RecognitionArch::Parseq => "Felix92/onnxtr-parseq",
        };

        RecognitionSpec {
            repo,
            normalization: RECOGNITION_NORMALIZATION,
            input_size: (32, 128),
            decoding: self.decoding(),
        }
    }
}

fn supported<T: IntoEnumIterator + std::fmt::Display>() -> String {
    T::iter()
        .map(|arch| arch.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
