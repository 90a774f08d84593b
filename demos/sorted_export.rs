use rb_key_tree::{Color, Error, RbTree};

fn main() -> Result<(), Error> {
    let mut tree = RbTree::new();
    for key in [10, 20, 30, 15, 25, 5] {
        let root = tree.insert(key)?;
        assert_eq!(tree.color(root), Some(Color::Black));
    }
    assert_eq!(tree.export_sorted(6), vec![5, 10, 15, 20, 25, 30]);

    let twenty = tree.find(&20).ok_or(Error::InvalidHandle)?;
    assert_eq!(tree.erase(twenty)?, 20);
    assert_eq!(tree.export_sorted(5), vec![5, 10, 15, 25, 30]);
    assert!(matches!(tree.erase(twenty), Err(Error::InvalidHandle)));

    let mut out = [0; 3];
    let written = tree.to_array(&mut out);
    println!("smallest {written} keys: {:?}", &out[..written]);
    println!("height {} for {} keys", tree.height(), tree.len());
    println!("released {} nodes", tree.destroy());
    Ok(())
}
