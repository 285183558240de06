//! CSV views of a document

use std::io::{self, Write};

use crate::document::Document;
use crate::write::push_values;

/// Raw channel values: one column per channel in pre-order, one row per frame.
///
/// Columns are named `<joint>_<channel>`; end sites contribute none.
pub fn write_channel_csv<W: Write>(doc: &Document, mut writer: W, precision: usize) -> io::Result<()> {
    let columns: Vec<String> = doc
        .skeleton()
        .joints()
        .flat_map(|(_, joint)| {
            joint
                .channels()
                .iter()
                .map(move |channel| format!("{}_{}", joint.name(), channel))
        })
        .collect();
    writeln!(writer, "{}", columns.join(","))?;

    let mut row = String::new();
    for frame in doc.motion().frames() {
        row.clear();
        push_values(&mut row, frame, ',', precision);
        writeln!(writer, "{}", row)?;
    }
    Ok(())
}

/// Global joint positions: `<joint>_x,<joint>_y,<joint>_z` for every joint
/// (end sites included), one row per frame.
pub fn write_position_csv<W: Write>(doc: &Document, mut writer: W, precision: usize) -> io::Result<()> {
    let skeleton = doc.skeleton();
    let columns: Vec<String> = skeleton
        .joints()
        .map(|(_, joint)| {
            let name = joint.name();
            format!("{name}_x,{name}_y,{name}_z")
        })
        .collect();
    writeln!(writer, "{}", columns.join(","))?;

    let mut row = String::new();
    let mut values = Vec::with_capacity(skeleton.len() * 3);
    for frame in doc.motion().frames() {
        let pose = skeleton.global_transforms(frame);
        values.clear();
        values.extend(pose.iter().flat_map(|(_, t)| t.position.to_array()));
        row.clear();
        push_values(&mut row, &values, ',', precision);
        writeln!(writer, "{}", row)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "\
HIERARCHY
ROOT Hips
{
  OFFSET 0 0 0
  CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation
  JOINT Neck
  {
    OFFSET 0 2 0
    CHANNELS 3 Zrotation Xrotation Yrotation
    End Site
    {
      OFFSET 0 1 0
    }
  }
}
MOTION
Frames: 2
Frame Time: 0.1
1 2 3 0 0 0 0 0 0
4 5 6 90 0 0 0 0 0
";

    fn csv(write: impl Fn(&Document, &mut Vec<u8>) -> io::Result<()>) -> Vec<String> {
        let doc = Document::parse(TEXT).unwrap().document;
        let mut out = Vec::new();
        write(&doc, &mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_channel_csv() {
        let lines = csv(|doc, out| write_channel_csv(doc, out, 2));
        assert_eq!(
            lines[0],
            "Hips_Xposition,Hips_Yposition,Hips_Zposition,Hips_Zrotation,Hips_Xrotation,Hips_Yrotation,\
             Neck_Zrotation,Neck_Xrotation,Neck_Yrotation"
        );
        assert_eq!(lines[1], "1.00,2.00,3.00,0.00,0.00,0.00,0.00,0.00,0.00");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_position_csv() {
        let lines = csv(|doc, out| write_position_csv(doc, out, 1));
        assert_eq!(
            lines[0],
            "Hips_x,Hips_y,Hips_z,Neck_x,Neck_y,Neck_z,Neck_EndSite_x,Neck_EndSite_y,Neck_EndSite_z"
        );
        assert_eq!(lines[1], "1.0,2.0,3.0,1.0,4.0,3.0,1.0,5.0,3.0");
        // Hips turned 90 degrees about Z: +Y offsets point along -X
        assert_eq!(lines[2], "4.0,5.0,6.0,2.0,5.0,6.0,1.0,5.0,6.0");
    }
}
