use conduit_canvas::input::{EditorCommand, InputState, Key, ModifiersState, commands_for};

fn press(keys: &[Key], modifiers: ModifiersState) -> InputState {
    InputState {
        modifiers,
        pressed_keys: keys.to_vec(),
        event_consumed_by_content: false,
    }
}

fn ctrl() -> ModifiersState {
    ModifiersState {
        ctrl: true,
        ..Default::default()
    }
}

#[test]
fn test_plain_keys() {
    let input = press(&[Key::Escape, Key::Delete, Key::Backspace], ModifiersState::default());
    assert_eq!(
        commands_for(&input),
        vec![
            EditorCommand::NavigateBack,
            EditorCommand::DeleteSelection,
            EditorCommand::DeleteSelection
        ]
    );

    // Letters do nothing without the command modifier.
    let input = press(&[Key::A, Key::Z], ModifiersState::default());
    assert!(commands_for(&input).is_empty());
}

#[test]
fn test_command_shortcuts() {
    let input = press(&[Key::A, Key::D, Key::Z, Key::Y], ctrl());
    assert_eq!(
        commands_for(&input),
        vec![
            EditorCommand::SelectAll,
            EditorCommand::DuplicateSelection,
            EditorCommand::Undo,
            EditorCommand::Redo
        ]
    );

    let meta_shift = ModifiersState {
        meta: true,
        shift: true,
        ..Default::default()
    };
    assert_eq!(commands_for(&press(&[Key::Z], meta_shift)), vec![EditorCommand::Redo]);
}

#[test]
fn test_consumed_input_is_ignored() {
    let mut input = press(&[Key::Delete], ModifiersState::default());
    input.event_consumed_by_content = true;
    assert!(commands_for(&input).is_empty());
}
