//! 通话逐字稿。
//!
//! AI 与用户各自一条只追加的日志，按轮次下标对齐；展示顺序由 [`Messages`]
//! 惰性投影：同一轮先 AI 后用户。

/// AI 的一句话及其语音载荷。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiUtterance {
    pub text: String,
    pub audio_b64: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Ai,
    User,
}

/// 展示序列中的一条消息；`slot` 为 `轮次 * 2 (+1)`，保证排序稳定。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message<'a> {
    pub slot: usize,
    pub turn: usize,
    pub speaker: Speaker,
    pub text: &'a str,
}

/// 一轮对话的合并视图。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turn<'a> {
    pub index: usize,
    pub ai: Option<&'a AiUtterance>,
    pub user: Option<&'a str>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    ai: Vec<AiUtterance>,
    user: Vec<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ai<S: Into<String>>(&mut self, text: S, audio_b64: Option<String>) -> usize {
        self.ai.push(AiUtterance {
            text: text.into(),
            audio_b64,
        });
        self.ai.len() - 1
    }

    pub fn push_user<S: Into<String>>(&mut self, text: S) -> usize {
        self.user.push(text.into());
        self.user.len() - 1
    }

    pub fn ai_lines(&self) -> impl Iterator<Item = &str> + '_ {
        self.ai.iter().map(|utterance| utterance.text.as_str())
    }

    pub fn user_lines(&self) -> impl Iterator<Item = &str> + '_ {
        self.user.iter().map(String::as_str)
    }

    pub fn ai_len(&self) -> usize {
        self.ai.len()
    }

    pub fn user_len(&self) -> usize {
        self.user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ai.is_empty() && self.user.is_empty()
    }

    pub fn turn(&self, index: usize) -> Option<Turn<'_>> {
        let ai = self.ai.get(index);
        let user = self.user.get(index).map(String::as_str);
        if ai.is_none() && user.is_none() {
            return None;
        }
        Some(Turn { index, ai, user })
    }

    pub fn turns(&self) -> impl Iterator<Item = Turn<'_>> + '_ {
        (0..self.ai.len().max(self.user.len())).filter_map(move |index| self.turn(index))
    }

    /// 交错的展示序列，每次调用都从头开始。
    ///
    /// 文本为空的条目视为缺席、不输出，但仍占用各自的 `slot`。
    pub fn messages(&self) -> Messages<'_> {
        Messages {
            transcript: self,
            turn: 0,
            user_next: false,
        }
    }
}

pub struct Messages<'a> {
    transcript: &'a Transcript,
    turn: usize,
    user_next: bool,
}

impl<'a> Iterator for Messages<'a> {
    type Item = Message<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let limit = self.transcript.ai.len().max(self.transcript.user.len());
        while self.turn < limit {
            let turn = self.turn;
            if !self.user_next {
                self.user_next = true;
                if let Some(ai) = self.transcript.ai.get(turn) {
                    if !ai.text.is_empty() {
                        return Some(Message {
                            slot: turn * 2,
                            turn,
                            speaker: Speaker::Ai,
                            text: &ai.text,
                        });
                    }
                }
            }

            self.user_next = false;
            self.turn += 1;
            if let Some(user) = self.transcript.user.get(turn) {
                if !user.is_empty() {
                    return Some(Message {
                        slot: turn * 2 + 1,
                        turn,
                        speaker: Speaker::User,
                        text: user,
                    });
                }
            }
        }
        None
    }
}
