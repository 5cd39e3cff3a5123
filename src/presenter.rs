use crate::config::Messages;
use crate::types::NUM_CLASSES;

/// Clases de referencia, en el orden de índice del clasificador
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Posture {
    Correct,
    Under,
    Over,
}

impl Posture {
    pub const ALL: [Posture; NUM_CLASSES] = [Posture::Correct, Posture::Under, Posture::Over];

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub fn index(&self) -> usize {
        match self {
            Posture::Correct => 0,
            Posture::Under => 1,
            Posture::Over => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Posture::Correct => "correct",
            Posture::Under => "under",
            Posture::Over => "over",
        }
    }

    /// Poses clave que el avatar alterna para esta clase
    pub fn animation(&self) -> AnimationTarget {
        let i = self.index();
        AnimationTarget {
            a: format!("pose_{}a", i),
            b: format!("pose_{}b", i),
            c: format!("pose_{}c", i),
        }
    }
}

/// Tres poses: el avatar mezcla A→B y A→C
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationTarget {
    pub a: String,
    pub b: String,
    pub c: String,
}

pub trait PosturePresenter {
    fn speak(&mut self, message: &str);
    fn show(&mut self, target: &AnimationTarget);
}

/// Selecciona animación y mensaje para `posture` y los envía al presentador
pub fn present<P>(presenter: &mut P, posture: Posture, messages: &Messages) -> AnimationTarget
where
    P: PosturePresenter + ?Sized,
{
    let target = posture.animation();
    presenter.show(&target);
    presenter.speak(messages.for_posture(posture));
    target
}

/// Presentador de terminal
#[derive(Debug, Default)]
pub struct ConsolePresenter;

impl PosturePresenter for ConsolePresenter {
    fn speak(&mut self, message: &str) {
        println!("🗣️  {}", message);
    }

    fn show(&mut self, target: &AnimationTarget) {
        log::info!("🎬 Animación: {} → {} / {}", target.a, target.b, target.c);
    }
}

/// Guarda todo lo presentado; útil para integrarlo o para pruebas
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    pub spoken: Vec<String>,
    pub shown: Vec<AnimationTarget>,
}

impl PosturePresenter for RecordingPresenter {
    fn speak(&mut self, message: &str) {
        self.spoken.push(message.to_string());
    }

    fn show(&mut self, target: &AnimationTarget) {
        self.shown.push(target.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NUM_AXES;

    #[test]
    fn test_index_mapping() {
        for (i, p) in Posture::ALL.iter().enumerate() {
            assert_eq!(p.index(), i);
            assert_eq!(Posture::from_index(i), Some(*p));
        }
        assert_eq!(Posture::from_index(NUM_CLASSES), None);
    }

    #[test]
    fn test_one_class_per_classifier_row() {
        // El clasificador devuelve el índice de una fila (eje), que se lee como postura
        assert_eq!(Posture::ALL.len(), NUM_AXES);
        for row in 0..NUM_AXES {
            assert!(Posture::from_index(row).is_some());
        }
    }

    #[test]
    fn test_present_under() {
        let mut presenter = RecordingPresenter::default();
        let messages = Messages::default();
        let target = present(&mut presenter, Posture::Under, &messages);

        assert_eq!(target.a, "pose_1a");
        assert_eq!(presenter.shown, vec![target]);
        assert_eq!(presenter.spoken, vec![messages.under.clone()]);
    }
}
