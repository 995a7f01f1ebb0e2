//! Stack dump rendering
//!
//! Output is innermost first, one frame per line:
//!
//! ```text
//! call stack: depth=3 generation=0
//!   #0  [4] 0x0000000000401190 compute (app)
//!   #1  [2] 0x0000000000401150 worker (app)
//!   #2  [1] 0x0000000000401120 main (app) <main>
//! ```

use std::io::{self, Write};

use super::activation::Activation;
use super::call_stack::CallStack;
use crate::symbolization::NameResolver;

/// Filters applied while rendering a dump
#[derive(Debug, Clone, Copy, Default)]
pub struct DumpOptions {
    /// Omit runtime startup frames below the main-entry frame
    pub application_only: bool,
    /// Replace frames inside the opaque region with a single summary line
    pub collapse_opaque: bool,
}

impl<R: NameResolver + ?Sized> CallStack<'_, R> {
    /// Write the full modeled stack to `out`
    ///
    /// # Errors
    /// Returns an error only if writing to `out` fails
    pub fn dump_stack<W: Write + ?Sized>(&mut self, out: &mut W) -> io::Result<()> {
        self.dump_stack_with(out, DumpOptions::default())
    }

    /// Write the modeled stack to `out`, filtered by `options`
    ///
    /// Reads the activations only; the dump watermark is the sole state updated.
    ///
    /// # Errors
    /// Returns an error only if writing to `out` fails
    pub fn dump_stack_with<W: Write + ?Sized>(
        &mut self,
        out: &mut W,
        options: DumpOptions,
    ) -> io::Result<()> {
        self.render(out, options)?;
        self.mark_printed();
        Ok(())
    }

    /// Dump only if the innermost frame changed since the last dump
    ///
    /// Returns whether anything was written.
    ///
    /// # Errors
    /// Returns an error only if writing to `out` fails
    pub fn dump_if_changed<W: Write + ?Sized>(
        &mut self,
        out: &mut W,
        options: DumpOptions,
    ) -> io::Result<bool> {
        if !self.changed_since_dump() {
            return Ok(false);
        }
        self.dump_stack_with(out, options)?;
        Ok(true)
    }

    fn render<W: Write + ?Sized>(&self, out: &mut W, options: DumpOptions) -> io::Result<()> {
        let activations = self.activations();
        writeln!(out, "call stack: depth={} generation={}", activations.len(), self.generation())?;

        let first = if options.application_only { self.application_start() } else { 0 };
        let visible = &activations[first..];
        if visible.is_empty() {
            writeln!(out, "  <empty>")?;
            return Ok(());
        }

        // Frames at or beyond this vector index sit inside the opaque region
        let opaque_from = match (options.collapse_opaque, self.opaque_entry_depth()) {
            (true, Some(depth)) => depth.max(first),
            _ => activations.len(),
        };
        let main_at = self.main_entry_depth().map(|depth| depth - 1);

        let hidden = activations.len() - opaque_from;
        if hidden > 0 {
            writeln!(out, "      ... {hidden} frames in opaque region")?;
        }

        for (i, activation) in activations[first..opaque_from].iter().enumerate().rev() {
            let at = first + i;
            let position = activations.len() - 1 - at;
            self.write_frame(out, position, activation, main_at == Some(at))?;
        }

        Ok(())
    }

    fn write_frame<W: Write + ?Sized>(
        &self,
        out: &mut W,
        position: usize,
        activation: &Activation,
        is_main: bool,
    ) -> io::Result<()> {
        let resolver = self.resolver();
        let target = activation.target();
        let routine = resolver.routine_name(target);
        let library = resolver.library_name(target);
        let suffix = if is_main { " <main>" } else { "" };

        writeln!(
            out,
            "  #{position:<2} [{}] {target} {routine} ({library}){suffix}",
            activation.index()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Address;
    use crate::symbolization::{NullResolver, SymbolTable, UNKNOWN};

    fn table() -> SymbolTable {
        SymbolTable::from_nm_output(
            "0000000000001000 T _start\n\
             0000000000001100 T main\n\
             0000000000001200 T worker\n\
             0000000000001300 T compute\n",
        )
        .unwrap()
    }

    fn render_to_string<R: NameResolver + ?Sized>(
        stack: &mut CallStack<'_, R>,
        options: DumpOptions,
    ) -> String {
        let mut buffer = Vec::new();
        stack.dump_stack_with(&mut buffer, options).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_empty_stack_dumps_placeholder() {
        let mut stack = CallStack::new(&NullResolver);
        let output = render_to_string(&mut stack, DumpOptions::default());
        assert_eq!(output, "call stack: depth=0 generation=0\n  <empty>\n");
    }

    #[test]
    fn test_dump_is_innermost_first() {
        let symbols = table();
        let mut stack = CallStack::new(&symbols);
        stack.process_main_entry(Address(0x9000), Address(0x1100));
        stack.process_call(Address(0x8000), Address(0x1200));
        stack.process_call(Address(0x7000), Address(0x1300));

        let output = render_to_string(&mut stack, DumpOptions::default());
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines[0], "call stack: depth=3 generation=0");
        assert!(lines[1].starts_with("  #0  [2] 0x0000000000001300 compute"));
        assert!(lines[2].contains("worker"));
        assert!(lines[3].contains(" main "));
        assert!(lines[3].ends_with("<main>"));
    }

    #[test]
    fn test_unknown_target_prints_sentinel() {
        let mut stack = CallStack::new(&NullResolver);
        stack.process_call(Address(0x9000), Address(0xdead_beef));

        let output = render_to_string(&mut stack, DumpOptions::default());

        assert!(output.contains("0x00000000deadbeef"));
        assert!(output.contains(&format!("{UNKNOWN} ({UNKNOWN})")));
    }

    #[test]
    fn test_application_only_hides_startup_frames() {
        let symbols = table();
        let mut stack = CallStack::new(&symbols);
        stack.process_call(Address(0xa000), Address(0x1000));
        stack.process_main_entry(Address(0x9000), Address(0x1100));
        stack.process_call(Address(0x8000), Address(0x1200));

        let options = DumpOptions { application_only: true, ..DumpOptions::default() };
        let output = render_to_string(&mut stack, options);

        assert!(!output.contains("_start"));
        assert!(output.contains("main"));
        assert!(output.contains("worker"));
        assert_eq!(output.lines().count(), 3);
    }

    #[test]
    fn test_collapse_opaque_summarizes_region() {
        let symbols = table();
        let mut stack = CallStack::new(&symbols);
        stack.process_main_entry(Address(0x9000), Address(0x1100));
        stack.process_call(Address(0x8000), Address(0x1200));
        stack.enter_opaque_region();
        stack.process_call(Address(0x7000), Address(0x1300));
        stack.process_call(Address(0x6000), Address(0x1300));

        let options = DumpOptions { collapse_opaque: true, ..DumpOptions::default() };
        let output = render_to_string(&mut stack, options);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines[1], "      ... 2 frames in opaque region");
        assert!(lines[2].starts_with("  #2 "));
        assert!(lines[2].contains("worker"));
        assert!(!output.contains("compute"));
    }

    #[test]
    fn test_dump_if_changed_elides_repeat_dumps() {
        let mut stack = CallStack::new(&NullResolver);
        stack.process_call(Address(0x9000), Address(0x1000));
        let mut buffer = Vec::new();

        assert!(stack.dump_if_changed(&mut buffer, DumpOptions::default()).unwrap());
        assert!(!stack.dump_if_changed(&mut buffer, DumpOptions::default()).unwrap());

        stack.process_call(Address(0x8000), Address(0x1100));
        assert!(stack.dump_if_changed(&mut buffer, DumpOptions::default()).unwrap());
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn test_sibling_call_from_same_site_is_dumped() {
        let mut stack = CallStack::new(&NullResolver);
        stack.process_call(Address(0x9000), Address(0x1000));
        stack.process_call(Address(0x8000), Address(0x2000));
        let mut buffer = Vec::new();
        assert!(stack.dump_if_changed(&mut buffer, DumpOptions::default()).unwrap());

        stack.process_return(Address(0x8008), false);
        stack.process_call(Address(0x8000), Address(0x3000));

        assert!(stack.changed_since_dump());
        assert!(stack.dump_if_changed(&mut buffer, DumpOptions::default()).unwrap());
    }

    #[test]
    fn test_dump_does_not_mutate_stack() {
        let mut stack = CallStack::new(&NullResolver);
        stack.process_call(Address(0x9000), Address(0x1000));
        stack.process_call(Address(0x8000), Address(0x1100));
        let before: Vec<Activation> = stack.activations().to_vec();

        let _ = render_to_string(&mut stack, DumpOptions { application_only: true, collapse_opaque: true });

        assert_eq!(stack.activations(), before.as_slice());
        assert_eq!(stack.activations()[1].index(), before[1].index());
    }
}
