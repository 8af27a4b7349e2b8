// src/session/navigation.rs

use serde::Serialize;

use super::SessionError;

/// Cursor into the exam: section index and question index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub section: usize,
    pub question: usize,
}

/// Moves a cursor over a fixed layout of section lengths.
///
/// Every section in the layout holds at least one question.
#[derive(Debug, Clone)]
pub struct Navigator {
    layout: Vec<usize>,
    position: Position,
}

impl Navigator {
    pub fn new(layout: Vec<usize>) -> Result<Self, SessionError> {
        if layout.is_empty() || layout.iter().any(|&len| len == 0) {
            return Err(SessionError::EmptyExam);
        }
        Ok(Self {
            layout,
            position: Position {
                section: 0,
                question: 0,
            },
        })
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Index of the current question in the flattened exam order.
    pub fn flat_index(&self) -> usize {
        self.layout[..self.position.section].iter().sum::<usize>() + self.position.question
    }

    pub fn is_last_question(&self) -> bool {
        let last_section = self.layout.len() - 1;
        self.position.section == last_section
            && self.position.question == self.layout[last_section] - 1
    }

    /// Returns false when already on the final question.
    pub fn next(&mut self) -> bool {
        let Position { section, question } = self.position;
        if question + 1 < self.layout[section] {
            self.position.question += 1;
            true
        } else if section + 1 < self.layout.len() {
            self.position = Position {
                section: section + 1,
                question: 0,
            };
            true
        } else {
            false
        }
    }

    /// Returns false when already on the first question.
    pub fn previous(&mut self) -> bool {
        let Position { section, question } = self.position;
        if question > 0 {
            self.position.question -= 1;
            true
        } else if section > 0 {
            self.position = Position {
                section: section - 1,
                question: self.layout[section - 1] - 1,
            };
            true
        } else {
            false
        }
    }

    pub fn jump(&mut self, section: usize, question: usize) -> Result<(), SessionError> {
        match self.layout.get(section) {
            Some(&len) if question < len => {
                self.position = Position { section, question };
                Ok(())
            }
            _ => Err(SessionError::OutOfRange { section, question }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_crosses_section_boundary() {
        let mut nav = Navigator::new(vec![3, 2]).unwrap();
        let mut visited = vec![nav.position()];
        while nav.next() {
            visited.push(nav.position());
        }

        let pairs: Vec<(usize, usize)> = visited.iter().map(|p| (p.section, p.question)).collect();
        assert_eq!(pairs, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1)]);
        assert!(nav.is_last_question());
        assert_eq!(nav.flat_index(), 4);
    }

    #[test]
    fn test_previous_steps_into_prior_section_end() {
        let mut nav = Navigator::new(vec![3, 2]).unwrap();
        nav.jump(1, 0).unwrap();
        assert!(nav.previous());
        assert_eq!(nav.position(), Position { section: 0, question: 2 });

        nav.jump(0, 0).unwrap();
        assert!(!nav.previous());
        assert_eq!(nav.position(), Position { section: 0, question: 0 });
    }

    #[test]
    fn test_is_last_question_only_at_final_pair() {
        let mut nav = Navigator::new(vec![3, 2]).unwrap();
        for (s, q) in [(0, 0), (0, 1), (0, 2), (1, 0)] {
            nav.jump(s, q).unwrap();
            assert!(!nav.is_last_question(), "({}, {}) is not last", s, q);
        }
        nav.jump(1, 1).unwrap();
        assert!(nav.is_last_question());
    }

    #[test]
    fn test_single_section_boundaries() {
        let mut nav = Navigator::new(vec![1]).unwrap();
        assert!(nav.is_last_question());
        assert!(!nav.next());

        let mut nav = Navigator::new(vec![4]).unwrap();
        assert!(!nav.is_last_question());
        nav.jump(0, 3).unwrap();
        assert!(nav.is_last_question());
    }

    #[test]
    fn test_jump_out_of_range() {
        let mut nav = Navigator::new(vec![3, 2]).unwrap();
        assert!(nav.jump(1, 2).is_err());
        assert!(nav.jump(2, 0).is_err());
        assert_eq!(nav.position(), Position { section: 0, question: 0 });
    }

    #[test]
    fn test_empty_layout_rejected() {
        assert!(Navigator::new(vec![]).is_err());
        assert!(Navigator::new(vec![2, 0]).is_err());
    }
}
