use std::{fmt, fs, path::Path, str::FromStr};

use thiserror::Error;

const MAX_CHANNELS: usize = 6;

#[derive(Debug, Error)]
pub enum BvhError {
    #[error("failed to read bvh file: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },
    #[error("line {line}: expected {expected}, found `{found}`")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
    },
    #[error("line {line}: invalid number `{token}`")]
    InvalidNumber { token: String, line: usize },
    #[error("line {line}: unknown channel `{name}`")]
    UnknownChannel { name: String, line: usize },
    #[error("line {line}: channel count {count} is out of range")]
    InvalidChannelCount { count: i64, line: usize },
    #[error("frame count {0} is negative")]
    NegativeFrameCount(i64),
    #[error("frame count {0} is too large")]
    FrameCountTooLarge(usize),
    #[error("frame time {0} must be positive")]
    InvalidFrameTime(f64),
    #[error("motion data too short: got {found} values, need {expected}")]
    MotionTooShort { expected: usize, found: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Xposition,
    Yposition,
    Zposition,
    Xrotation,
    Yrotation,
    Zrotation,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Xposition => "Xposition",
            Channel::Yposition => "Yposition",
            Channel::Zposition => "Zposition",
            Channel::Xrotation => "Xrotation",
            Channel::Yrotation => "Yrotation",
            Channel::Zrotation => "Zrotation",
        }
    }

    pub fn is_position(&self) -> bool {
        matches!(
            self,
            Channel::Xposition | Channel::Yposition | Channel::Zposition
        )
    }

    /// Axis index, 0 = X, 1 = Y, 2 = Z.
    pub fn axis(&self) -> usize {
        match self {
            Channel::Xposition | Channel::Xrotation => 0,
            Channel::Yposition | Channel::Yrotation => 1,
            Channel::Zposition | Channel::Zrotation => 2,
        }
    }
}

impl FromStr for Channel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Xposition" => Ok(Channel::Xposition),
            "Yposition" => Ok(Channel::Yposition),
            "Zposition" => Ok(Channel::Zposition),
            "Xrotation" => Ok(Channel::Xrotation),
            "Yrotation" => Ok(Channel::Yrotation),
            "Zrotation" => Ok(Channel::Zrotation),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One joint of the hierarchy. End sites have an empty name and no channels.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub name: String,
    pub offset: [f32; 3],
    pub channels: Vec<Channel>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn is_end_site(&self) -> bool {
        self.name.is_empty()
    }

    fn visit<'a>(&'a self, out: &mut Vec<&'a Node>) {
        out.push(self);
        for child in &self.children {
            child.visit(out);
        }
    }
}

#[derive(Clone, Debug)]
pub struct Bvh {
    pub root: Node,
    pub frames: usize,
    pub frame_time: f64,
    /// `frames * channel_count` values, one row per frame.
    pub motion: Vec<f32>,
}

impl Bvh {
    pub fn get_seconds(&self) -> f64 {
        self.frames as f64 * self.frame_time
    }

    pub fn channel_count(&self) -> usize {
        self.joints().iter().map(|node| node.channels.len()).sum()
    }

    /// Nodes in depth-first pre-order, end sites included.
    pub fn joints(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        self.root.visit(&mut out);
        out
    }

    pub fn frame(&self, index: usize) -> Option<&[f32]> {
        if index >= self.frames {
            return None;
        }
        let width = self.channel_count();
        self.motion.get(index * width..(index + 1) * width)
    }
}

pub fn load(path: impl AsRef<Path>) -> Result<Bvh, BvhError> {
    let text = fs::read_to_string(path.as_ref())?;
    parse(&text)
}

pub fn parse(text: &str) -> Result<Bvh, BvhError> {
    let mut tokens = Tokens::new(text);

    tokens.expect("HIERARCHY")?;
    tokens.expect("ROOT")?;
    let root = parse_joint(&mut tokens)?;
    let channel_count = {
        let mut nodes = Vec::new();
        root.visit(&mut nodes);
        nodes.iter().map(|node| node.channels.len()).sum::<usize>()
    };

    tokens.expect("MOTION")?;
    tokens.expect_label("Frames")?;
    let (frames, _) = tokens.next_number::<i64>("frame count")?;
    if frames < 0 {
        return Err(BvhError::NegativeFrameCount(frames));
    }
    let frames = frames as usize;

    tokens.expect("Frame")?;
    tokens.expect_label("Time")?;
    let (frame_time, _) = tokens.next_number::<f64>("frame time")?;
    if frame_time.is_nan() || frame_time <= 0.0 {
        return Err(BvhError::InvalidFrameTime(frame_time));
    }

    let expected = frames
        .checked_mul(channel_count)
        .ok_or(BvhError::FrameCountTooLarge(frames))?;
    // Every value takes at least one digit and one separator.
    let mut motion = Vec::with_capacity(expected.min(text.len() / 2));
    while motion.len() < expected {
        match tokens.next() {
            Some((token, line)) => motion.push(parse_number::<f32>(token, line)?),
            None => {
                return Err(BvhError::MotionTooShort {
                    expected,
                    found: motion.len(),
                });
            }
        }
    }

    let trailing = tokens.count();
    if trailing > 0 {
        log::warn!("ignoring {trailing} trailing values after motion data");
    }

    Ok(Bvh {
        root,
        frames,
        frame_time,
        motion,
    })
}

/// Parses `name { OFFSET .. CHANNELS .. children }` after ROOT/JOINT.
fn parse_joint(tokens: &mut Tokens<'_>) -> Result<Node, BvhError> {
    let (name, _) = tokens.next_or_eof("joint name")?;
    let name = name.to_string();
    tokens.expect("{")?;
    let offset = parse_offset(tokens)?;

    tokens.expect("CHANNELS")?;
    let (count, line) = tokens.next_number::<i64>("channel count")?;
    if !(0..=MAX_CHANNELS as i64).contains(&count) {
        return Err(BvhError::InvalidChannelCount { count, line });
    }
    let mut channels = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (token, line) = tokens.next_or_eof("channel name")?;
        let channel = token.parse::<Channel>().map_err(|_| BvhError::UnknownChannel {
            name: token.to_string(),
            line,
        })?;
        channels.push(channel);
    }

    let mut children = Vec::new();
    loop {
        let (token, line) = tokens.next_or_eof("JOINT, End Site or }")?;
        match token {
            "JOINT" => children.push(parse_joint(tokens)?),
            "End" => {
                tokens.expect("Site")?;
                children.push(parse_end_site(tokens)?);
            }
            "}" => break,
            other => {
                return Err(BvhError::UnexpectedToken {
                    expected: "JOINT, End Site or }".to_string(),
                    found: other.to_string(),
                    line,
                });
            }
        }
    }

    Ok(Node {
        name,
        offset,
        channels,
        children,
    })
}

fn parse_end_site(tokens: &mut Tokens<'_>) -> Result<Node, BvhError> {
    tokens.expect("{")?;
    let offset = parse_offset(tokens)?;
    tokens.expect("}")?;
    Ok(Node {
        name: String::new(),
        offset,
        channels: Vec::new(),
        children: Vec::new(),
    })
}

fn parse_offset(tokens: &mut Tokens<'_>) -> Result<[f32; 3], BvhError> {
    tokens.expect("OFFSET")?;
    let (x, _) = tokens.next_number::<f32>("offset x")?;
    let (y, _) = tokens.next_number::<f32>("offset y")?;
    let (z, _) = tokens.next_number::<f32>("offset z")?;
    Ok([x, y, z])
}

fn parse_number<T: FromStr>(token: &str, line: usize) -> Result<T, BvhError> {
    token.parse().map_err(|_| BvhError::InvalidNumber {
        token: token.to_string(),
        line,
    })
}

/// Whitespace tokenizer that remembers the 1-based line of each token.
struct Tokens<'a> {
    inner: Box<dyn Iterator<Item = (&'a str, usize)> + 'a>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        let inner = text
            .lines()
            .enumerate()
            .flat_map(|(idx, line)| line.split_whitespace().map(move |tok| (tok, idx + 1)));
        Self {
            inner: Box::new(inner),
        }
    }

    fn next_or_eof(&mut self, expected: &str) -> Result<(&'a str, usize), BvhError> {
        self.next().ok_or_else(|| BvhError::UnexpectedEof {
            expected: expected.to_string(),
        })
    }

    fn expect(&mut self, keyword: &str) -> Result<usize, BvhError> {
        let (token, line) = self.next_or_eof(keyword)?;
        if token != keyword {
            return Err(BvhError::UnexpectedToken {
                expected: keyword.to_string(),
                found: token.to_string(),
                line,
            });
        }
        Ok(line)
    }

    /// Accepts both `Frames:` and `Frames :`.
    fn expect_label(&mut self, label: &str) -> Result<usize, BvhError> {
        let (token, line) = self.next_or_eof(label)?;
        match token.strip_suffix(':') {
            Some(stem) if stem == label => Ok(line),
            None if token == label => self.expect(":"),
            _ => Err(BvhError::UnexpectedToken {
                expected: format!("{label}:"),
                found: token.to_string(),
                line,
            }),
        }
    }

    fn next_number<T: FromStr>(&mut self, expected: &str) -> Result<(T, usize), BvhError> {
        let (token, line) = self.next_or_eof(expected)?;
        Ok((parse_number(token, line)?, line))
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = (&'a str, usize);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::SAMPLE_BVH as SAMPLE;


    #[test]
    fn parses_hierarchy_and_motion() {
        let bvh = parse(SAMPLE).unwrap();

        assert_eq!(bvh.root.name, "Hips");
        assert_eq!(bvh.root.channels.len(), 6);
        assert_eq!(bvh.root.children.len(), 2);
        assert_eq!(bvh.root.children[0].name, "Chest");
        assert_eq!(bvh.root.children[0].offset, [0.0, 10.0, 0.0]);
        assert!(bvh.root.children[0].children[0].is_end_site());
        assert_eq!(bvh.frames, 2);
        assert_eq!(bvh.channel_count(), 12);
        assert_eq!(bvh.motion.len(), 24);
        assert!((bvh.get_seconds() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn joints_are_depth_first() {
        let bvh = parse(SAMPLE).unwrap();
        let names: Vec<&str> = bvh.joints().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Hips", "Chest", "", "LeftHip", ""]);
    }

    #[test]
    fn frame_rows_slice_motion() {
        let bvh = parse(SAMPLE).unwrap();
        let second = bvh.frame(1).unwrap();
        assert_eq!(second.len(), 12);
        assert_eq!(second[0], 1.0);
        assert_eq!(second[6], 90.0);
        assert!(bvh.frame(2).is_none());
    }

    #[test]
    fn accepts_split_labels() {
        let text = SAMPLE
            .replace("Frames: 2", "Frames : 2")
            .replace("Frame Time: 0.5", "Frame Time : 0.5");
        let bvh = parse(&text).unwrap();
        assert_eq!(bvh.frames, 2);
    }

    #[test]
    fn rejects_unknown_channel() {
        let text = SAMPLE.replacen("Xrotation Yrotation\n    End", "Wrotation Yrotation\n    End", 1);
        match parse(&text) {
            Err(BvhError::UnknownChannel { name, line }) => {
                assert_eq!(name, "Wrotation");
                assert_eq!(line, 9);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_short_motion() {
        let text = SAMPLE.replace("Frames: 2", "Frames: 3");
        assert!(matches!(
            parse(&text),
            Err(BvhError::MotionTooShort {
                expected: 36,
                found: 24
            })
        ));
    }

    #[test]
    fn rejects_bad_frame_time() {
        let text = SAMPLE.replace("Frame Time: 0.5", "Frame Time: 0");
        assert!(matches!(parse(&text), Err(BvhError::InvalidFrameTime(_))));
    }

    #[test]
    fn reports_truncated_hierarchy() {
        let text = "HIERARCHY\nROOT Hips\n{\n OFFSET 0 0";
        assert!(matches!(parse(text), Err(BvhError::UnexpectedEof { .. })));
    }

    #[test]
    fn reports_invalid_number_with_line() {
        let text = SAMPLE.replace("OFFSET 3.0 0.0 0.0", "OFFSET 3.0 abc 0.0");
        match parse(&text) {
            Err(BvhError::InvalidNumber { token, line }) => {
                assert_eq!(token, "abc");
                assert_eq!(line, 17);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn huge_frame_count_reports_short_motion() {
        let text = "HIERARCHY\nROOT Hips\n{\n  OFFSET 0 0 0\n  CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation\n  End Site\n  {\n    OFFSET 0 1 0\n  }\n}\nMOTION\nFrames: 100000000000\nFrame Time: 0.033\n0 0 0 0 0 0\n";
        assert!(matches!(
            parse(text),
            Err(BvhError::MotionTooShort {
                expected: 600000000000,
                found: 6
            })
        ));
    }

    #[test]
    fn frame_count_overflow_is_an_error() {
        let text = SAMPLE.replace("Frames: 2", &format!("Frames: {}", i64::MAX));
        assert!(matches!(parse(&text), Err(BvhError::FrameCountTooLarge(_))));
    }

    #[test]
    fn rejects_channel_count_above_six() {
        let text = SAMPLE.replacen("CHANNELS 3 Zrotation", "CHANNELS 7 Zrotation", 1);
        match parse(&text) {
            Err(BvhError::InvalidChannelCount { count, line }) => {
                assert_eq!(count, 7);
                assert_eq!(line, 9);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_negative_frame_count() {
        let text = SAMPLE.replace("Frames: 2", "Frames: -1");
        assert!(matches!(parse(&text), Err(BvhError::NegativeFrameCount(-1))));
    }

    #[test]
    fn trailing_values_are_ignored() {
        let text = format!("{SAMPLE}7 8 9\n");
        let bvh = parse(&text).unwrap();
        assert_eq!(bvh.motion.len(), 24);
        assert_eq!(bvh.frame(1).unwrap()[0], 1.0);
    }

    #[test]
    fn zero_frames_is_valid() {
        let text = SAMPLE
            .replace("Frames: 2", "Frames: 0")
            .replace("0 90 0 0 0 0 0 0 0 0 0 0\n1 90 0 0 0 0 90 0 0 0 0 0\n", "");
        let bvh = parse(&text).unwrap();
        assert_eq!(bvh.frames, 0);
        assert_eq!(bvh.get_seconds(), 0.0);
        assert!(bvh.frame(0).is_none());
    }
}
